//! Reconciliation of cached connection state with the remote's view.
//!
//! Two entry points, one merge: on-demand polls (`refresh`) and pushed
//! webhook updates (`apply_webhook`) both flow through [`merge`], which
//! enforces the field-level precedence policy. The cardinal rule is that
//! incoming absence never erases known-good data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::GatewayError;
use crate::gateway::registry::ClientRegistry;
use crate::gateway::{normalize, session_name, tenant_from_session_name};
use crate::store::models::{ConnectionSnapshot, TenantBinding};
use crate::store::GatewayStore;

/// Whether a status reflects a live remote observation or the stored state
/// from before an unreachable instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Live,
    Cached,
}

/// Merged connection view returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub phone: Option<String>,
    pub state: String,
    pub source: StatusSource,
}

#[derive(Debug, Default)]
pub struct SweepStats {
    pub refreshed: usize,
    pub failed: usize,
}

pub struct StateReconciler {
    store: Arc<dyn GatewayStore>,
    clients: ClientRegistry,
}

impl StateReconciler {
    pub fn new(store: Arc<dyn GatewayStore>, clients: ClientRegistry) -> Self {
        Self { store, clients }
    }

    /// Poll path: fetch the live state and fold it into the binding.
    ///
    /// An unreachable instance is not a disconnected session: transport
    /// failures degrade to the last stored state, tagged `Cached`.
    pub async fn refresh(&self, tenant_id: &str) -> Result<ConnectionStatus, GatewayError> {
        let Some(binding) = self.store.get_binding(tenant_id).await? else {
            return Err(GatewayError::NotAllocated(tenant_id.to_string()));
        };
        let Some(client) = self.clients.get(binding.instance_id) else {
            error!(
                tenant_id,
                instance_id = binding.instance_id,
                "binding points at instance with no client handle"
            );
            return Err(GatewayError::Inconsistent(format!(
                "binding for tenant {tenant_id} points at instance {} with no client handle",
                binding.instance_id
            )));
        };

        let session = session_name(tenant_id);
        match client.connection_state(&session).await {
            Ok(snapshot) => {
                let merged = self.apply_snapshot(&binding, &snapshot).await?;
                Ok(ConnectionStatus {
                    connected: merged.connected,
                    phone: merged.phone.clone(),
                    state: snapshot.raw_state,
                    source: StatusSource::Live,
                })
            }
            Err(e) => {
                warn!(tenant_id, error = %e, "status poll failed, serving cached state");
                Ok(cached_status(&binding))
            }
        }
    }

    /// Push path: fold a webhook payload into the binding it names.
    ///
    /// Malformed instance names and webhooks for unbound tenants are logged
    /// and dropped; the handler never fails on remote-originated input.
    pub async fn apply_webhook(
        &self,
        instance_name: &str,
        payload: &Value,
    ) -> Result<(), GatewayError> {
        let Some(tenant_id) = tenant_from_session_name(instance_name) else {
            warn!(instance_name, "dropping webhook with malformed instance name");
            return Ok(());
        };
        let Some(binding) = self.store.get_binding(tenant_id).await? else {
            warn!(tenant_id, "dropping webhook for unbound tenant");
            return Ok(());
        };

        let snapshot = normalize::snapshot_from_value(payload);
        self.apply_snapshot(&binding, &snapshot).await?;
        Ok(())
    }

    /// Merge and persist, skipping the write when nothing changed.
    async fn apply_snapshot(
        &self,
        binding: &TenantBinding,
        snapshot: &ConnectionSnapshot,
    ) -> Result<TenantBinding, GatewayError> {
        match merge(binding, snapshot, Utc::now()) {
            Some(updated) => {
                self.store.update_binding(&updated).await?;
                info!(
                    tenant_id = %updated.tenant_id,
                    connected = updated.connected,
                    "reconciled connection state"
                );
                Ok(updated)
            }
            None => {
                debug!(tenant_id = %binding.tenant_id, "connection state unchanged");
                Ok(binding.clone())
            }
        }
    }

    /// One periodic pass over every binding. Per-tenant failures are logged
    /// and do not stop the pass.
    pub async fn sweep_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let bindings = match self.store.list_bindings().await {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(error = %e, "sweep could not list bindings");
                stats.failed += 1;
                return stats;
            }
        };

        for binding in bindings {
            match self.refresh(&binding.tenant_id).await {
                Ok(_) => stats.refreshed += 1,
                Err(e) => {
                    warn!(tenant_id = %binding.tenant_id, error = %e, "sweep refresh failed");
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}

fn cached_status(binding: &TenantBinding) -> ConnectionStatus {
    ConnectionStatus {
        connected: binding.connected,
        phone: binding.phone.clone(),
        state: (if binding.connected { "open" } else { "close" }).to_string(),
        source: StatusSource::Cached,
    }
}

/// Field-level merge of a live snapshot into the stored binding.
///
/// - The incoming connected flag always wins; it is the freshest signal.
/// - The phone updates only when the incoming value is non-empty. A
///   disconnected tenant keeps its last known number for support and audit.
/// - Transition to connected stamps `connected_at` (first time only) and
///   clears `disconnected_at`; transition to disconnected stamps
///   `disconnected_at`.
///
/// Returns `None` when nothing changed, so callers can skip the write.
pub fn merge(
    binding: &TenantBinding,
    snapshot: &ConnectionSnapshot,
    now: DateTime<Utc>,
) -> Option<TenantBinding> {
    let mut next = binding.clone();
    let mut changed = false;

    if next.connected != snapshot.connected {
        next.connected = snapshot.connected;
        if snapshot.connected {
            if next.connected_at.is_none() {
                next.connected_at = Some(now);
            }
            next.disconnected_at = None;
        } else {
            next.disconnected_at = Some(now);
        }
        changed = true;
    }

    if let Some(phone) = snapshot.phone.as_deref() {
        if !phone.is_empty() && next.phone.as_deref() != Some(phone) {
            next.phone = Some(phone.to_string());
            changed = true;
        }
    }

    if changed {
        next.updated_at = now;
        Some(next)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(connected: bool, phone: Option<&str>) -> TenantBinding {
        let now = Utc::now();
        TenantBinding {
            tenant_id: "t1".to_string(),
            instance_id: 1,
            connected,
            phone: phone.map(str::to_string),
            connected_at: connected.then_some(now),
            disconnected_at: None,
            last_pairing_code_issued_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(connected: bool, phone: Option<&str>) -> ConnectionSnapshot {
        ConnectionSnapshot {
            raw_state: (if connected { "open" } else { "close" }).to_string(),
            connected,
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn empty_incoming_phone_never_erases_known_number() {
        let stored = binding(true, Some("5511999999999"));
        let merged = merge(&stored, &snapshot(true, None), Utc::now());
        assert!(merged.is_none(), "nothing changed, write should be skipped");

        let merged = merge(&stored, &snapshot(true, Some("")), Utc::now());
        assert!(merged.is_none());
    }

    #[test]
    fn new_nonempty_phone_updates() {
        let stored = binding(true, Some("5511999999999"));
        let merged = merge(&stored, &snapshot(true, Some("5511988887777")), Utc::now()).unwrap();
        assert_eq!(merged.phone.as_deref(), Some("5511988887777"));
    }

    #[test]
    fn connect_transition_stamps_connected_at_once() {
        let mut stored = binding(false, None);
        stored.disconnected_at = Some(Utc::now());
        let now = Utc::now();
        let merged = merge(&stored, &snapshot(true, None), now).unwrap();
        assert!(merged.connected);
        assert_eq!(merged.connected_at, Some(now));
        assert_eq!(merged.disconnected_at, None);

        // Already-set connected_at survives a reconnect.
        let earlier = merged.connected_at;
        let mut dropped = merged.clone();
        dropped.connected = false;
        let reconnected = merge(&dropped, &snapshot(true, None), Utc::now()).unwrap();
        assert_eq!(reconnected.connected_at, earlier);
    }

    #[test]
    fn disconnect_transition_keeps_phone() {
        let stored = binding(true, Some("5511999999999"));
        let now = Utc::now();
        let merged = merge(&stored, &snapshot(false, None), now).unwrap();
        assert!(!merged.connected);
        assert_eq!(merged.disconnected_at, Some(now));
        assert_eq!(merged.phone.as_deref(), Some("5511999999999"));
    }

    #[test]
    fn identical_snapshot_is_a_no_op() {
        let stored = binding(true, Some("5511999999999"));
        assert!(merge(&stored, &snapshot(true, Some("5511999999999")), Utc::now()).is_none());
    }
}
