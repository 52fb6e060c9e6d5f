//! Normalization of remote status payloads.
//!
//! The remote API has gone through several response shapes over time: the
//! state has lived under different field names, "connected" has several
//! spellings, and phone-like fields may carry JID suffixes. Everything
//! upstream of this module sees one canonical [`ConnectionSnapshot`].

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

use crate::store::models::ConnectionSnapshot;

/// Recognized spellings of the connected state. Anything not listed here is
/// treated as disconnected; that is the documented default.
static CONNECTED_STATES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["open", "connected"].into_iter().collect());

/// Field names the state label has historically appeared under.
const STATE_FIELDS: [&str; 3] = ["state", "status", "connectionStatus"];

/// Field names a phone-like value has historically appeared under.
const PHONE_FIELDS: [&str; 5] = ["phone", "number", "ownerJid", "owner", "wid"];

/// Containers the remote nests the interesting fields inside, depending on
/// whether the payload came from a status poll or a webhook event.
const NESTED_CONTAINERS: [&str; 2] = ["data", "instance"];

pub fn is_connected_state(raw: &str) -> bool {
    CONNECTED_STATES.contains(raw.to_ascii_lowercase().as_str())
}

/// Strip WhatsApp-style JID decoration: everything from the first `@` on,
/// and any `:device` marker before it. Empty results collapse to `None`.
pub fn strip_jid(raw: &str) -> Option<String> {
    let bare = raw.split('@').next().unwrap_or("");
    let bare = bare.split(':').next().unwrap_or("");
    let bare = bare.trim();
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

/// Fold any of the known remote payload shapes into one snapshot.
pub fn snapshot_from_value(value: &Value) -> ConnectionSnapshot {
    let raw_state = find_state(value).unwrap_or_else(|| "unknown".to_string());

    // An explicit boolean wins over the state label when both are present.
    let connected = find_bool(value, "connected").unwrap_or_else(|| is_connected_state(&raw_state));

    let phone = find_phone(value);

    ConnectionSnapshot {
        raw_state,
        connected,
        phone,
    }
}

fn find_state(value: &Value) -> Option<String> {
    for field in STATE_FIELDS {
        if let Some(s) = value.get(field).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    for container in NESTED_CONTAINERS {
        if let Some(nested) = value.get(container) {
            if let Some(found) = find_state(nested) {
                return Some(found);
            }
        }
    }
    None
}

fn find_bool(value: &Value, field: &str) -> Option<bool> {
    if let Some(b) = value.get(field).and_then(Value::as_bool) {
        return Some(b);
    }
    for container in NESTED_CONTAINERS {
        if let Some(found) = value.get(container).and_then(|v| find_bool(v, field)) {
            return Some(found);
        }
    }
    None
}

fn find_phone(value: &Value) -> Option<String> {
    for field in PHONE_FIELDS {
        if let Some(s) = value.get(field).and_then(Value::as_str) {
            if let Some(phone) = strip_jid(s) {
                return Some(phone);
            }
        }
    }
    for container in NESTED_CONTAINERS {
        if let Some(found) = value.get(container).and_then(|v| find_phone(v)) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_connected_synonyms() {
        assert!(is_connected_state("open"));
        assert!(is_connected_state("connected"));
        assert!(is_connected_state("CONNECTED"));
        assert!(!is_connected_state("close"));
        assert!(!is_connected_state("connecting"));
        assert!(!is_connected_state(""));
    }

    #[test]
    fn strips_jid_suffixes() {
        assert_eq!(strip_jid("5511999999999@s.whatsapp.net").as_deref(), Some("5511999999999"));
        assert_eq!(strip_jid("5511999999999@c.us").as_deref(), Some("5511999999999"));
        assert_eq!(strip_jid("5511999999999:12@s.whatsapp.net").as_deref(), Some("5511999999999"));
        assert_eq!(strip_jid("5511999999999").as_deref(), Some("5511999999999"));
        assert_eq!(strip_jid("@s.whatsapp.net"), None);
        assert_eq!(strip_jid(""), None);
    }

    #[test]
    fn reads_legacy_state_field_names() {
        for field in ["state", "status", "connectionStatus"] {
            let snap = snapshot_from_value(&json!({ field: "open" }));
            assert!(snap.connected, "field {field} should normalize to connected");
            assert_eq!(snap.raw_state, "open");
        }
    }

    #[test]
    fn reads_nested_instance_shape() {
        let snap = snapshot_from_value(&json!({
            "instance": { "state": "close", "ownerJid": "5511988887777@s.whatsapp.net" }
        }));
        assert!(!snap.connected);
        assert_eq!(snap.raw_state, "close");
        assert_eq!(snap.phone.as_deref(), Some("5511988887777"));
    }

    #[test]
    fn webhook_data_shape_with_explicit_boolean() {
        let snap = snapshot_from_value(&json!({
            "event": "connection.update",
            "data": { "connected": true, "phone": "5511988887777" }
        }));
        assert!(snap.connected);
        assert_eq!(snap.phone.as_deref(), Some("5511988887777"));
    }

    #[test]
    fn explicit_boolean_beats_state_label() {
        let snap = snapshot_from_value(&json!({ "state": "open", "connected": false }));
        assert!(!snap.connected);
    }

    #[test]
    fn missing_fields_default_to_disconnected_unknown() {
        let snap = snapshot_from_value(&json!({}));
        assert!(!snap.connected);
        assert_eq!(snap.raw_state, "unknown");
        assert_eq!(snap.phone, None);
    }
}
