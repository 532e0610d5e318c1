//! Agent registry - thread-safe catalog of configured agents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::static_config::AgentConfig;
use crate::interfaces::{AgentRegistry, AgentSpec, DeliveryTarget, RegistryError};

/// Thread-safe agent registry backed by configuration.
///
/// Agents can be added or retired at runtime; inactive entries stay
/// registered but are neither resolvable nor offered to the planner.
#[derive(Clone, Default)]
pub struct StaticAgentRegistry {
    agents: Arc<RwLock<HashMap<String, AgentConfig>>>,
}

impl StaticAgentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated from configuration.
    pub fn from_configs(configs: impl IntoIterator<Item = AgentConfig>) -> Self {
        let agents = configs
            .into_iter()
            .map(|config| (config.name.clone(), config))
            .collect();
        Self {
            agents: Arc::new(RwLock::new(agents)),
        }
    }

    /// Update or add an agent.
    pub async fn register(&self, config: AgentConfig) {
        info!(
            agent = %config.name,
            target = %config.target,
            active = config.is_active(),
            "Registering agent"
        );
        self.agents.write().await.insert(config.name.clone(), config);
    }

    /// Remove an agent entirely.
    pub async fn remove(&self, name: &str) {
        info!(agent = %name, "Removing agent");
        self.agents.write().await.remove(name);
    }

    /// Number of registered agents, active or not.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}

#[async_trait]
impl AgentRegistry for StaticAgentRegistry {
    async fn resolve(&self, agent: &str) -> Result<DeliveryTarget, RegistryError> {
        let agents = self.agents.read().await;
        match agents.get(agent) {
            Some(config) if config.is_active() => {
                debug!(agent = %agent, target = %config.target, "Resolved agent");
                Ok(config.target.clone())
            }
            _ => Err(RegistryError::UnknownAgent(agent.to_string())),
        }
    }

    async fn catalog(&self) -> Vec<AgentSpec> {
        let agents = self.agents.read().await;
        let mut specs: Vec<AgentSpec> = agents
            .values()
            .filter(|config| config.is_active())
            .map(AgentConfig::spec)
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::AgentState;

    fn registry() -> StaticAgentRegistry {
        let mut retired = AgentConfig::active("retired", "Old agent", "old-tasks");
        retired.state = AgentState::Inactive;
        StaticAgentRegistry::from_configs([
            AgentConfig::active("writer", "Drafts text", "writing"),
            AgentConfig::active("researcher", "Finds sources", "research"),
            retired,
        ])
    }

    #[tokio::test]
    async fn test_resolve_active_agent() {
        let target = registry().resolve("writer").await.unwrap();
        assert_eq!(target, DeliveryTarget::queue("writing"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_agent() {
        let result = registry().resolve("nobody").await;
        assert_eq!(result, Err(RegistryError::UnknownAgent("nobody".to_string())));
    }

    #[tokio::test]
    async fn test_inactive_agent_not_resolvable() {
        let result = registry().resolve("retired").await;
        assert!(matches!(result, Err(RegistryError::UnknownAgent(_))));
    }

    #[tokio::test]
    async fn test_catalog_lists_active_agents_sorted() {
        let names: Vec<String> = registry()
            .catalog()
            .await
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        assert_eq!(names, vec!["researcher", "writer"]);
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = StaticAgentRegistry::new();
        assert!(registry.is_empty().await);

        registry
            .register(AgentConfig::active("critic", "Reviews drafts", "review"))
            .await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.resolve("critic").await.is_ok());

        registry.remove("critic").await;
        assert!(registry.resolve("critic").await.is_err());
    }
}
