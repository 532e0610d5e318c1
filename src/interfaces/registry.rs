//! Agent registry interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a worker listens for dispatched sub-tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeliveryTarget {
    /// Named work queue.
    Queue { name: String },
}

impl DeliveryTarget {
    pub fn queue(name: impl Into<String>) -> Self {
        Self::Queue { name: name.into() }
    }
}

impl std::fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryTarget::Queue { name } => write!(f, "queue:{}", name),
        }
    }
}

/// Agent description offered to the planner as a delegation option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the agent's input.
    pub input_schema: Value,
}

/// Errors that can occur during agent resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

/// Lookup from agent identity to delivery target.
///
/// Implementations:
/// - `StaticAgentRegistry`: catalog loaded from configuration
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Resolve an agent identity to its delivery target.
    async fn resolve(&self, agent: &str) -> Result<DeliveryTarget, RegistryError>;

    /// Agents currently available for delegation.
    async fn catalog(&self) -> Vec<AgentSpec>;
}
