pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use self::models::{Instance, TenantBinding};

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome of an idempotent binding insert.
///
/// `CapacityRace` means another allocation filled the chosen instance between
/// the availability read and the counter increment; the caller picks again.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(TenantBinding),
    AlreadyBound(TenantBinding),
    CapacityRace,
}

/// Durable Instance and TenantBinding records.
///
/// The tenant-count mutations are atomic at the store level: insert/delete of
/// a binding and the matching counter move happen as one unit, and the
/// capacity guard lives inside the increment so concurrent allocations cannot
/// overshoot.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_instances(&self) -> Result<Vec<Instance>, StoreError>;

    async fn get_instance(&self, instance_id: i64) -> Result<Option<Instance>, StoreError>;

    /// Among active instances under `capacity`, the one with the lowest
    /// tenant count; ties break toward the lowest id. `None` means the pool
    /// is saturated.
    async fn find_available_instance(&self, capacity: i32)
        -> Result<Option<Instance>, StoreError>;

    async fn get_binding(&self, tenant_id: &str) -> Result<Option<TenantBinding>, StoreError>;

    async fn list_bindings(&self) -> Result<Vec<TenantBinding>, StoreError>;

    /// Create the binding and increment the instance counter as one unit.
    /// Re-inserting an existing tenant returns the current binding untouched.
    async fn insert_binding(
        &self,
        tenant_id: &str,
        instance_id: i64,
        capacity: i32,
    ) -> Result<InsertOutcome, StoreError>;

    /// Delete the binding, then decrement the owning instance counter, in
    /// that order. Returns false when no binding existed.
    async fn delete_binding(&self, tenant_id: &str) -> Result<bool, StoreError>;

    /// Persist reconciled connection state for one tenant.
    async fn update_binding(&self, binding: &TenantBinding) -> Result<(), StoreError>;

    async fn touch_pairing_issued(
        &self,
        tenant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Read-only lookup into the system of record for tenants.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool, StoreError>;
}
