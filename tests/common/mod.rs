//! Shared test fixtures: a scriptable fake gateway client and state builders.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use messaging_gateway::gateway::client::{
    ClientError, CreateOutcome, GatewayClient, PairingArtifact,
};
use messaging_gateway::gateway::registry::ClientRegistry;
use messaging_gateway::services::provisioner::RetryPolicy;
use messaging_gateway::store::memory::{MemoryDirectory, MemoryStore};
use messaging_gateway::store::models::{ConnectionSnapshot, Instance};

#[derive(Debug, Default)]
pub struct FakeState {
    pub sessions: HashSet<String>,
    pub create_calls: usize,
    pub delete_calls: usize,
    pub fetch_calls: usize,
    pub webhook_calls: usize,
    pub sent_messages: Vec<(String, String, String)>,
    /// What a status poll reports. `None` simulates an unreachable instance.
    pub snapshot: Option<ConnectionSnapshot>,
    /// When set, the pairing artifact only becomes available after the
    /// session has been deleted at least once (the wedged-session scenario).
    pub artifact_requires_recreate: bool,
    /// When set, no fetch ever returns an artifact.
    pub artifact_never_ready: bool,
    /// When set, webhook configuration fails.
    pub webhook_config_fails: bool,
}

/// Scriptable in-memory stand-in for one remote instance.
#[derive(Debug, Default)]
pub struct FakeGateway {
    pub state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_snapshot(&self, snapshot: Option<ConnectionSnapshot>) {
        self.state.lock().unwrap().snapshot = snapshot;
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn webhook_calls(&self) -> usize {
        self.state.lock().unwrap().webhook_calls
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn create_session(&self, session: &str) -> Result<CreateOutcome, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if state.sessions.insert(session.to_string()) {
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    async fn fetch_pairing_artifact(
        &self,
        _session: &str,
    ) -> Result<Option<PairingArtifact>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if state.artifact_never_ready {
            return Ok(None);
        }
        if state.artifact_requires_recreate && state.delete_calls == 0 {
            return Ok(None);
        }
        Ok(Some(PairingArtifact {
            code: "PAIR-1234".to_string(),
            image_base64: Some("iVBORw0KGgo=".to_string()),
        }))
    }

    async fn connection_state(&self, _session: &str) -> Result<ConnectionSnapshot, ClientError> {
        let state = self.state.lock().unwrap();
        match &state.snapshot {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Err(ClientError::Unreachable("connection refused".to_string())),
        }
    }

    async fn delete_session(&self, session: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        state.sessions.remove(session);
        Ok(())
    }

    async fn configure_webhook(
        &self,
        _session: &str,
        _callback_url: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.webhook_calls += 1;
        if state.webhook_config_fails {
            return Err(ClientError::Rejected {
                status: 500,
                detail: "webhook endpoint rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn send_text(&self, session: &str, to: &str, body: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .sent_messages
            .push((session.to_string(), to.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn instance(id: i64, tenant_count: i32) -> Instance {
    Instance {
        id,
        base_url: format!("http://gw-{id}.local"),
        is_active: true,
        tenant_count,
    }
}

pub fn connected_snapshot(phone: &str) -> ConnectionSnapshot {
    ConnectionSnapshot {
        raw_state: "open".to_string(),
        connected: true,
        phone: Some(phone.to_string()),
    }
}

/// A pool of fakes plus the registry pointing at them, keyed by instance id.
pub struct FakePool {
    pub registry: ClientRegistry,
    pub gateways: Vec<(i64, Arc<FakeGateway>)>,
}

impl FakePool {
    pub fn for_instances(instances: &[Instance]) -> Self {
        let mut registry = ClientRegistry::new();
        let mut gateways = Vec::new();
        for inst in instances {
            let fake = FakeGateway::new();
            registry.insert(inst.id, fake.clone());
            gateways.push((inst.id, fake));
        }
        Self { registry, gateways }
    }

    pub fn gateway(&self, instance_id: i64) -> Arc<FakeGateway> {
        self.gateways
            .iter()
            .find(|(id, _)| *id == instance_id)
            .map(|(_, fake)| fake.clone())
            .expect("no fake for instance")
    }
}

/// Everything a service-level test needs, wired to in-memory fakes.
pub struct TestHarness {
    pub store: MemoryStore,
    pub directory: MemoryDirectory,
    pub pool: FakePool,
}

impl TestHarness {
    pub fn new(instances: Vec<Instance>, tenants: &[&str]) -> Self {
        let pool = FakePool::for_instances(&instances);
        Self {
            store: MemoryStore::with_instances(instances),
            directory: MemoryDirectory::with_tenants(tenants.iter().copied()),
            pool,
        }
    }

    pub fn zero_delay_policy() -> RetryPolicy {
        RetryPolicy::immediate(3)
    }
}
