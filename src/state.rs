//! Application state shared across request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::gateway::registry::ClientRegistry;
use crate::services::allocator::AllocatorService;
use crate::services::provisioner::{RetryPolicy, SessionProvisioner};
use crate::services::reconciler::StateReconciler;
use crate::store::{GatewayStore, TenantDirectory};

/// Shared application state, passed to handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn GatewayStore>,
    clients: ClientRegistry,
    allocator: AllocatorService,
    provisioner: SessionProvisioner,
    reconciler: Arc<StateReconciler>,
    cors_enabled: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn GatewayStore>,
        directory: Arc<dyn TenantDirectory>,
        clients: ClientRegistry,
        config: &AppConfig,
    ) -> Self {
        let allocator = AllocatorService::new(
            store.clone(),
            directory,
            clients.clone(),
            config.gateway.instance_capacity,
            config.gateway.webhook_base_url.clone(),
        );
        let provisioner = SessionProvisioner::new(
            store.clone(),
            clients.clone(),
            RetryPolicy::from_delays_ms(&config.provisioning.retry_delays_ms),
        );
        let reconciler = Arc::new(StateReconciler::new(store.clone(), clients.clone()));

        Self {
            inner: Arc::new(AppStateInner {
                store,
                clients,
                allocator,
                provisioner,
                reconciler,
                cors_enabled: config.server.enable_cors,
            }),
        }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }

    pub fn store(&self) -> &Arc<dyn GatewayStore> {
        &self.inner.store
    }

    pub fn allocator(&self) -> &AllocatorService {
        &self.inner.allocator
    }

    pub fn provisioner(&self) -> &SessionProvisioner {
        &self.inner.provisioner
    }

    pub fn reconciler(&self) -> &Arc<StateReconciler> {
        &self.inner.reconciler
    }

    pub fn cors_enabled(&self) -> bool {
        self.inner.cors_enabled
    }
}
