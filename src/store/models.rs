use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One externally-hosted, capacity-limited messaging-session host.
///
/// Instances are provisioned out-of-band by an operations task; this service
/// only reads them and moves `tenant_count` up and down.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instance {
    pub id: i64,
    pub base_url: String,
    pub is_active: bool,
    pub tenant_count: i32,
}

/// Durable tenant -> instance assignment plus cached connection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantBinding {
    pub tenant_id: String,
    pub instance_id: i64,
    pub connected: bool,
    /// Last known good phone number. Never cleared by reconciliation.
    pub phone: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub last_pairing_code_issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantBinding {
    pub fn new(tenant_id: &str, instance_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            instance_id,
            connected: false,
            phone: None,
            connected_at: None,
            disconnected_at: None,
            last_pairing_code_issued_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Live view of one tenant's session on a remote instance.
///
/// Produced by the gateway client, consumed immediately by the reconciler.
/// Never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub raw_state: String,
    pub connected: bool,
    pub phone: Option<String>,
}

/// Occupancy summary for one instance, for the operator-facing listing.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOccupancy {
    pub instance_id: i64,
    pub tenant_count: i32,
    pub occupancy_percent: f64,
}

impl InstanceOccupancy {
    pub fn from_instance(instance: &Instance, capacity: i32) -> Self {
        let percent = if capacity > 0 {
            f64::from(instance.tenant_count) / f64::from(capacity) * 100.0
        } else {
            0.0
        };
        Self {
            instance_id: instance.id,
            tenant_count: instance.tenant_count,
            occupancy_percent: percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_percent_is_relative_to_capacity() {
        let instance = Instance {
            id: 1,
            base_url: "http://gw-1.local".to_string(),
            is_active: true,
            tenant_count: 41,
        };
        let occ = InstanceOccupancy::from_instance(&instance, 100);
        assert_eq!(occ.tenant_count, 41);
        assert!((occ.occupancy_percent - 41.0).abs() < f64::EPSILON);
    }

    #[test]
    fn occupancy_percent_with_zero_capacity_is_zero() {
        let instance = Instance {
            id: 1,
            base_url: "http://gw-1.local".to_string(),
            is_active: true,
            tenant_count: 0,
        };
        let occ = InstanceOccupancy::from_instance(&instance, 0);
        assert_eq!(occ.occupancy_percent, 0.0);
    }
}
