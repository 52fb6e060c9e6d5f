pub mod allocator;
pub mod provisioner;
pub mod reconciler;

use thiserror::Error;

use crate::store::StoreError;

/// Domain error taxonomy, preserved end to end so the UI can tell
/// operator-actionable conditions from tenant-actionable ones.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller passed a tenant id unknown to the system of record.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// Every active instance is full. Needs capacity provisioning, not a retry.
    #[error("no instance has spare capacity")]
    CapacityExhausted,

    /// Caller skipped allocation.
    #[error("tenant is not allocated: {0}")]
    NotAllocated(String),

    /// Remote flakiness outlasted the bounded retries and the recreate fallback.
    #[error("pairing code unavailable for tenant {0}")]
    PairingUnavailable(String),

    /// Transient transport failure talking to an instance.
    #[error("remote instance unreachable: {0}")]
    RemoteUnreachable(String),

    /// An invariant violation, e.g. a binding pointing at an instance with no
    /// client handle. Logged loudly at the boundary, never silently repaired.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A failure that does not affect correctness of the primary operation.
/// Call sites decide whether to log it, surface it as a warning, or drop it.
#[derive(Debug, Clone)]
pub enum SoftFailure {
    /// Configuring the instance's push webhook failed; the tenant degrades
    /// to polling until a later reconfigure.
    WebhookConfig { instance_id: i64, detail: String },

    /// The remote already had a session for this tenant.
    SessionAlreadyExists { session: String },
}

impl std::fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftFailure::WebhookConfig {
                instance_id,
                detail,
            } => write!(f, "webhook configuration failed on instance {instance_id}: {detail}"),
            SoftFailure::SessionAlreadyExists { session } => {
                write!(f, "session {session} already exists")
            }
        }
    }
}
