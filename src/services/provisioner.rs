//! Session provisioning: make a remote session exist and hand back a
//! scannable pairing code.
//!
//! The remote session takes a variable, short time to become ready after
//! creation, so the artifact fetch runs on a bounded schedule. A session
//! wedged in an unrecoverable remote state gets exactly one delete+recreate
//! before the call gives up with `PairingUnavailable`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{GatewayError, SoftFailure};
use crate::gateway::client::{CreateOutcome, GatewayClient, PairingArtifact};
use crate::gateway::registry::ClientRegistry;
use crate::gateway::session_name;
use crate::store::GatewayStore;

/// Bounded retry schedule for the artifact fetch. Injected so tests can use
/// a zero-delay schedule instead of waiting on real timers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before each attempt; the length is the attempt count.
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_delays_ms(delays_ms: &[u64]) -> Self {
        Self {
            delays: delays_ms.iter().map(|&ms| Duration::from_millis(ms)).collect(),
        }
    }

    /// Zero-delay schedule with the given attempt count.
    pub fn immediate(attempts: usize) -> Self {
        Self {
            delays: vec![Duration::ZERO; attempts],
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_delays_ms(&[200, 500, 1000])
    }
}

/// Result of a successful provisioning call: the scannable artifact plus any
/// soft failures encountered on the way, for the caller to surface.
#[derive(Debug)]
pub struct PairingIssued {
    pub artifact: PairingArtifact,
    pub warnings: Vec<SoftFailure>,
}

pub struct SessionProvisioner {
    store: Arc<dyn GatewayStore>,
    clients: ClientRegistry,
    policy: RetryPolicy,
}

impl SessionProvisioner {
    pub fn new(store: Arc<dyn GatewayStore>, clients: ClientRegistry, policy: RetryPolicy) -> Self {
        Self {
            store,
            clients,
            policy,
        }
    }

    /// Ensure a remote session exists for an allocated tenant and return its
    /// pairing artifact.
    pub async fn issue_pairing_code(
        &self,
        tenant_id: &str,
    ) -> Result<PairingIssued, GatewayError> {
        let Some(binding) = self.store.get_binding(tenant_id).await? else {
            return Err(GatewayError::NotAllocated(tenant_id.to_string()));
        };
        let Some(client) = self.clients.get(binding.instance_id) else {
            return Err(GatewayError::Inconsistent(format!(
                "binding for tenant {tenant_id} points at instance {} with no client handle",
                binding.instance_id
            )));
        };

        let session = session_name(tenant_id);
        let mut warnings = Vec::new();
        if let Some(soft) = self.ensure_session(client.as_ref(), &session).await? {
            warn!(tenant_id, warning = %soft, "provisioning soft failure");
            warnings.push(soft);
        }

        let artifact = match self.fetch_with_schedule(client.as_ref(), &session).await {
            Some(artifact) => artifact,
            None => {
                // Last resort: discard the wedged session and start over.
                info!(tenant_id, session, "pairing attempts exhausted, recreating session");
                if let Err(e) = self.recreate(client.as_ref(), &session).await {
                    warn!(tenant_id, error = %e, "session recreate failed");
                    return Err(GatewayError::PairingUnavailable(tenant_id.to_string()));
                }
                match self.fetch_with_schedule(client.as_ref(), &session).await {
                    Some(artifact) => artifact,
                    None => return Err(GatewayError::PairingUnavailable(tenant_id.to_string())),
                }
            }
        };

        // Observability signal only; its failure must not fail the call.
        if let Err(e) = self.store.touch_pairing_issued(tenant_id, Utc::now()).await {
            warn!(tenant_id, error = %e, "failed to record pairing-code timestamp");
        }

        Ok(PairingIssued { artifact, warnings })
    }

    /// Create the session. "Already exists" is success, reported back as a
    /// soft failure so the caller can surface it.
    async fn ensure_session(
        &self,
        client: &dyn GatewayClient,
        session: &str,
    ) -> Result<Option<SoftFailure>, GatewayError> {
        match client.create_session(session).await {
            Ok(CreateOutcome::Created) => {
                debug!(session, "created remote session");
                Ok(None)
            }
            Ok(CreateOutcome::AlreadyExists) => {
                debug!(session, "remote session already exists");
                Ok(Some(SoftFailure::SessionAlreadyExists {
                    session: session.to_string(),
                }))
            }
            Err(e) => Err(GatewayError::RemoteUnreachable(e.to_string())),
        }
    }

    /// One bounded round of artifact fetches. Transport errors within the
    /// round count as a missed attempt, not a hard failure.
    async fn fetch_with_schedule(
        &self,
        client: &dyn GatewayClient,
        session: &str,
    ) -> Option<PairingArtifact> {
        for (attempt, delay) in self.policy.delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match client.fetch_pairing_artifact(session).await {
                Ok(Some(artifact)) => return Some(artifact),
                Ok(None) => {
                    debug!(session, attempt, "pairing artifact not ready");
                }
                Err(e) => {
                    warn!(session, attempt, error = %e, "pairing artifact fetch failed");
                }
            }
        }
        None
    }

    async fn recreate(
        &self,
        client: &dyn GatewayClient,
        session: &str,
    ) -> Result<(), GatewayError> {
        client
            .delete_session(session)
            .await
            .map_err(|e| GatewayError::RemoteUnreachable(e.to_string()))?;
        // A just-deleted session coming back as "already exists" is not worth
        // reporting; only the outcome matters here.
        self.ensure_session(client, session).await.map(|_| ())
    }
}
