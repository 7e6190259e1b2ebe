use crate::models::RoutingPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persistence for per-identity routing policies.
#[async_trait]
pub trait RoutingPolicyStore: Send + Sync {
    /// Saved policy for `name`, or `None` when nothing was ever saved.
    async fn load_routing_policy(&self, name: &str)
        -> Result<Option<RoutingPolicy>, anyhow::Error>;

    async fn persist_routing_policy(&self, policy: &RoutingPolicy) -> Result<(), anyhow::Error>;

    /// Drop the policy of a deleted identity. Missing policies are not an error.
    async fn remove_routing_policy(&self, name: &str) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Default)]
pub struct InMemoryRoutingStore {
    policies: Mutex<HashMap<String, RoutingPolicy>>,
}

impl InMemoryRoutingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoutingPolicyStore for InMemoryRoutingStore {
    async fn load_routing_policy(
        &self,
        name: &str,
    ) -> Result<Option<RoutingPolicy>, anyhow::Error> {
        Ok(self
            .policies
            .lock()
            .map_err(|e| anyhow::anyhow!("Routing store mutex poisoned: {}", e))?
            .get(name)
            .cloned())
    }

    async fn persist_routing_policy(&self, policy: &RoutingPolicy) -> Result<(), anyhow::Error> {
        self.policies
            .lock()
            .map_err(|e| anyhow::anyhow!("Routing store mutex poisoned: {}", e))?
            .insert(policy.owner_identity.clone(), policy.clone());
        Ok(())
    }

    async fn remove_routing_policy(&self, name: &str) -> Result<(), anyhow::Error> {
        self.policies
            .lock()
            .map_err(|e| anyhow::anyhow!("Routing store mutex poisoned: {}", e))?
            .remove(name);
        Ok(())
    }
}
