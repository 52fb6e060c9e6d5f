//! Tenant allocation and release across the instance pool.
//!
//! Allocation bin-packs toward even load: always the active instance with
//! the lowest tenant count, ties broken by lowest id. Release reverses the
//! allocation and is safe to call any number of times.

use std::sync::Arc;

use tracing::{info, warn};

use super::{GatewayError, SoftFailure};
use crate::gateway::registry::ClientRegistry;
use crate::gateway::session_name;
use crate::store::models::{InstanceOccupancy, TenantBinding};
use crate::store::{GatewayStore, InsertOutcome, TenantDirectory};

/// How many times allocation re-picks an instance after losing a capacity
/// race to a concurrent allocation.
const MAX_PLACEMENT_ATTEMPTS: usize = 3;

/// Result of a successful allocation. Soft failures along the way ride along
/// so the boundary can surface them without failing the call.
#[derive(Debug)]
pub struct Allocation {
    pub binding: TenantBinding,
    pub warnings: Vec<SoftFailure>,
}

pub struct AllocatorService {
    store: Arc<dyn GatewayStore>,
    directory: Arc<dyn TenantDirectory>,
    clients: ClientRegistry,
    capacity: i32,
    webhook_base_url: String,
}

impl AllocatorService {
    pub fn new(
        store: Arc<dyn GatewayStore>,
        directory: Arc<dyn TenantDirectory>,
        clients: ClientRegistry,
        capacity: i32,
        webhook_base_url: String,
    ) -> Self {
        Self {
            store,
            directory,
            clients,
            capacity,
            webhook_base_url: webhook_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Idempotently bind a tenant to an instance with spare capacity.
    ///
    /// Re-allocating an already-bound tenant returns the existing binding
    /// unchanged, so callers may invoke this on every restart or retry.
    pub async fn allocate(&self, tenant_id: &str) -> Result<Allocation, GatewayError> {
        if let Some(binding) = self.store.get_binding(tenant_id).await? {
            return Ok(Allocation {
                binding,
                warnings: Vec::new(),
            });
        }

        if !self.directory.tenant_exists(tenant_id).await? {
            return Err(GatewayError::TenantNotFound(tenant_id.to_string()));
        }

        let binding = self.place(tenant_id).await?;
        info!(
            tenant_id,
            instance_id = binding.instance_id,
            "allocated tenant to instance"
        );

        let mut warnings = Vec::new();
        if let Some(failure) = self.configure_webhook(&binding).await {
            warn!(tenant_id, %failure, "continuing without push webhook");
            warnings.push(failure);
        }

        Ok(Allocation { binding, warnings })
    }

    /// Pick an instance and persist the binding, re-picking when a concurrent
    /// allocation fills the chosen instance first.
    async fn place(&self, tenant_id: &str) -> Result<TenantBinding, GatewayError> {
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let Some(instance) = self.store.find_available_instance(self.capacity).await? else {
                return Err(GatewayError::CapacityExhausted);
            };

            match self
                .store
                .insert_binding(tenant_id, instance.id, self.capacity)
                .await?
            {
                InsertOutcome::Inserted(binding) => return Ok(binding),
                InsertOutcome::AlreadyBound(binding) => return Ok(binding),
                InsertOutcome::CapacityRace => continue,
            }
        }
        Err(GatewayError::CapacityExhausted)
    }

    /// Best-effort: point the instance's push webhooks at our inbound endpoint.
    async fn configure_webhook(&self, binding: &TenantBinding) -> Option<SoftFailure> {
        let session = session_name(&binding.tenant_id);
        let Some(client) = self.clients.get(binding.instance_id) else {
            return Some(SoftFailure::WebhookConfig {
                instance_id: binding.instance_id,
                detail: "no client handle for instance".to_string(),
            });
        };
        let callback = format!("{}/webhooks/{}", self.webhook_base_url, session);
        match client.configure_webhook(&session, &callback).await {
            Ok(()) => None,
            Err(e) => Some(SoftFailure::WebhookConfig {
                instance_id: binding.instance_id,
                detail: e.to_string(),
            }),
        }
    }

    /// Idempotently tear down a tenant's session and free its capacity slot.
    ///
    /// The remote teardown is best effort; an orphaned remote session is
    /// cheap to garbage-collect later, while a binding pointing at a freed
    /// slot would corrupt future placement, so the binding goes first.
    pub async fn release(&self, tenant_id: &str) -> Result<(), GatewayError> {
        let Some(binding) = self.store.get_binding(tenant_id).await? else {
            return Ok(());
        };

        let session = session_name(tenant_id);
        match self.clients.get(binding.instance_id) {
            Some(client) => {
                if let Err(e) = client.delete_session(&session).await {
                    warn!(tenant_id, error = %e, "remote session teardown failed, releasing anyway");
                }
            }
            None => {
                warn!(
                    tenant_id,
                    instance_id = binding.instance_id,
                    "no client handle for instance, skipping remote teardown"
                );
            }
        }

        let removed = self.store.delete_binding(tenant_id).await?;
        if removed {
            info!(
                tenant_id,
                instance_id = binding.instance_id,
                "released tenant"
            );
        }
        Ok(())
    }

    /// Occupancy listing for operators deciding when to provision capacity.
    pub async fn instance_occupancy(&self) -> Result<Vec<InstanceOccupancy>, GatewayError> {
        let instances = self.store.list_instances().await?;
        Ok(instances
            .iter()
            .map(|i| InstanceOccupancy::from_instance(i, self.capacity))
            .collect())
    }
}
