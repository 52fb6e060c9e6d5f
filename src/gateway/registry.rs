//! Registry of gateway client handles, one per remote instance.
//!
//! Built once at startup from the instance table and passed by reference,
//! so the set of remote instances is explicit and replaceable with fakes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::client::{ClientError, GatewayClient, HttpGatewayClient};
use crate::store::models::Instance;

#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<i64, Arc<dyn GatewayClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every instance in the pool.
    pub fn from_instances(
        instances: &[Instance],
        timeout: Duration,
        api_key: Option<&str>,
    ) -> Result<Self, ClientError> {
        let mut registry = Self::new();
        for instance in instances {
            // A trailing slash keeps Url::join appending instead of replacing
            // the last path segment.
            let mut base = instance.base_url.clone();
            if !base.ends_with('/') {
                base.push('/');
            }
            let base_url = Url::parse(&base)
                .map_err(|e| ClientError::InvalidPayload(format!("bad base url {base}: {e}")))?;
            let client =
                HttpGatewayClient::new(base_url, timeout, api_key.map(str::to_string))?;
            registry.insert(instance.id, Arc::new(client));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, instance_id: i64, client: Arc<dyn GatewayClient>) {
        self.clients.insert(instance_id, client);
    }

    pub fn get(&self, instance_id: i64) -> Option<Arc<dyn GatewayClient>> {
        self.clients.get(&instance_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
