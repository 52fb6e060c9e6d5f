//! In-memory store, used by tests and for local development without Postgres.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::models::{Instance, TenantBinding};
use super::{GatewayStore, InsertOutcome, StoreError, TenantDirectory};

#[derive(Default)]
struct Inner {
    instances: BTreeMap<i64, Instance>,
    bindings: HashMap<String, TenantBinding>,
}

/// Mutex over both maps, so binding inserts and counter moves are observed
/// atomically, matching the read-committed guarantee of the SQL store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(instances: Vec<Instance>) -> Self {
        let inner = Inner {
            instances: instances.into_iter().map(|i| (i.id, i)).collect(),
            bindings: HashMap::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub async fn add_instance(&self, instance: Instance) {
        let mut inner = self.inner.lock().await;
        inner.instances.insert(instance.id, instance);
    }

    pub async fn instance_count(&self, instance_id: i64) -> Option<i32> {
        let inner = self.inner.lock().await;
        inner.instances.get(&instance_id).map(|i| i.tenant_count)
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.instances.values().cloned().collect())
    }

    async fn get_instance(&self, instance_id: i64) -> Result<Option<Instance>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.instances.get(&instance_id).cloned())
    }

    async fn find_available_instance(
        &self,
        capacity: i32,
    ) -> Result<Option<Instance>, StoreError> {
        let inner = self.inner.lock().await;
        // BTreeMap iteration is id-ordered, so min_by_key keeps the lowest id
        // among equally loaded instances.
        Ok(inner
            .instances
            .values()
            .filter(|i| i.is_active && i.tenant_count < capacity)
            .min_by_key(|i| i.tenant_count)
            .cloned())
    }

    async fn get_binding(&self, tenant_id: &str) -> Result<Option<TenantBinding>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.bindings.get(tenant_id).cloned())
    }

    async fn list_bindings(&self) -> Result<Vec<TenantBinding>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.bindings.values().cloned().collect())
    }

    async fn insert_binding(
        &self,
        tenant_id: &str,
        instance_id: i64,
        capacity: i32,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.bindings.get(tenant_id) {
            return Ok(InsertOutcome::AlreadyBound(existing.clone()));
        }

        let Some(instance) = inner.instances.get_mut(&instance_id) else {
            return Err(StoreError::NotFound(format!("instance {instance_id}")));
        };
        if !instance.is_active || instance.tenant_count >= capacity {
            return Ok(InsertOutcome::CapacityRace);
        }
        instance.tenant_count += 1;

        let binding = TenantBinding::new(tenant_id, instance_id, Utc::now());
        inner.bindings.insert(tenant_id.to_string(), binding.clone());
        Ok(InsertOutcome::Inserted(binding))
    }

    async fn delete_binding(&self, tenant_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(binding) = inner.bindings.remove(tenant_id) else {
            return Ok(false);
        };
        if let Some(instance) = inner.instances.get_mut(&binding.instance_id) {
            if instance.tenant_count > 0 {
                instance.tenant_count -= 1;
            }
        }
        Ok(true)
    }

    async fn update_binding(&self, binding: &TenantBinding) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.bindings.get_mut(&binding.tenant_id) {
            Some(existing) => {
                *existing = binding.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "binding for tenant {}",
                binding.tenant_id
            ))),
        }
    }

    async fn touch_pairing_issued(
        &self,
        tenant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.bindings.get_mut(tenant_id) {
            Some(binding) => {
                binding.last_pairing_code_issued_at = Some(at);
                binding.updated_at = at;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("binding for tenant {tenant_id}"))),
        }
    }
}

/// Tenant directory backed by a fixed set of known ids.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    known: Arc<HashSet<String>>,
    allow_all: bool,
}

impl MemoryDirectory {
    pub fn with_tenants<I, S>(tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: Arc::new(tenants.into_iter().map(Into::into).collect()),
            allow_all: false,
        }
    }

    /// Development fallback when no system of record is wired up.
    pub fn allow_all() -> Self {
        Self {
            known: Arc::new(HashSet::new()),
            allow_all: true,
        }
    }
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool, StoreError> {
        Ok(self.allow_all || self.known.contains(tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: i64, tenant_count: i32) -> Instance {
        Instance {
            id,
            base_url: format!("http://gw-{id}.local"),
            is_active: true,
            tenant_count,
        }
    }

    #[tokio::test]
    async fn picks_lowest_occupancy_with_id_tiebreak() {
        let store =
            MemoryStore::with_instances(vec![instance(1, 5), instance(2, 3), instance(3, 3)]);
        let found = store.find_available_instance(100).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
    }

    #[tokio::test]
    async fn saturated_pool_yields_none() {
        let store = MemoryStore::with_instances(vec![instance(1, 2)]);
        assert!(store.find_available_instance(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_instances_are_skipped() {
        let mut inactive = instance(1, 0);
        inactive.is_active = false;
        let store = MemoryStore::with_instances(vec![inactive, instance(2, 10)]);
        let found = store.find_available_instance(100).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
    }

    #[tokio::test]
    async fn insert_is_idempotent_and_counts_once() {
        let store = MemoryStore::with_instances(vec![instance(1, 0)]);
        let first = store.insert_binding("t1", 1, 100).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));
        let second = store.insert_binding("t1", 1, 100).await.unwrap();
        assert!(matches!(second, InsertOutcome::AlreadyBound(_)));
        assert_eq!(store.instance_count(1).await, Some(1));
    }

    #[tokio::test]
    async fn insert_reports_capacity_race_at_limit() {
        let store = MemoryStore::with_instances(vec![instance(1, 1)]);
        let outcome = store.insert_binding("t1", 1, 1).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::CapacityRace));
        assert_eq!(store.instance_count(1).await, Some(1));
    }

    #[tokio::test]
    async fn delete_decrements_and_is_idempotent() {
        let store = MemoryStore::with_instances(vec![instance(1, 0)]);
        store.insert_binding("t1", 1, 100).await.unwrap();
        assert!(store.delete_binding("t1").await.unwrap());
        assert_eq!(store.instance_count(1).await, Some(0));
        assert!(!store.delete_binding("t1").await.unwrap());
        assert_eq!(store.instance_count(1).await, Some(0));
    }
}
