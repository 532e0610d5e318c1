//! Static agent catalog configuration.
//!
//! Agents are declared in the `agents` section of the main configuration or
//! in a standalone YAML catalog file:
//!
//! ```yaml
//! - name: researcher
//!   description: Finds sources for a question
//!   schema: { type: object, properties: { q: { type: string } } }
//!   state: active
//!   target: { type: queue, name: research-tasks }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::interfaces::{AgentSpec, DeliveryTarget};

/// Lifecycle state of a configured agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Active,
    Inactive,
}

/// One configured agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the agent's input.
    #[serde(default = "default_schema")]
    pub schema: Value,
    #[serde(default)]
    pub state: AgentState,
    pub target: DeliveryTarget,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

impl AgentConfig {
    /// Convenience constructor for an active queue-backed agent.
    pub fn active(
        name: impl Into<String>,
        description: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: default_schema(),
            state: AgentState::Active,
            target: DeliveryTarget::queue(queue),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AgentState::Active
    }

    /// Planner-facing description of this agent.
    pub fn spec(&self) -> AgentSpec {
        AgentSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.clone(),
        }
    }
}

/// Errors loading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read agent catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid agent catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load a YAML list of agents from a file.
pub fn load_catalog_file(path: impl AsRef<Path>) -> Result<Vec<AgentConfig>, CatalogError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path_str.clone(),
        source,
    })?;
    let agents: Vec<AgentConfig> =
        serde_yaml::from_str(&contents).map_err(|source| CatalogError::Parse {
            path: path_str.clone(),
            source,
        })?;

    info!(path = %path_str, count = agents.len(), "Loaded agent catalog");
    Ok(agents)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_catalog_with_defaults() {
        let yaml = r#"
- name: researcher
  description: Finds sources
  target: { type: queue, name: research-tasks }
- name: retired
  state: inactive
  schema: { type: object, required: [q] }
  target: { type: queue, name: old-tasks }
"#;
        let agents: Vec<AgentConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(agents.len(), 2);
        assert!(agents[0].is_active());
        assert_eq!(agents[0].schema, serde_json::json!({"type": "object"}));
        assert_eq!(agents[0].target, DeliveryTarget::queue("research-tasks"));
        assert!(!agents[1].is_active());
        assert_eq!(agents[1].spec().input_schema["required"][0], "q");
    }

    #[test]
    fn test_load_catalog_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- name: writer\n  description: Drafts text\n  target: {{ type: queue, name: writing }}"
        )
        .unwrap();

        let agents = load_catalog_file(file.path()).unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "writer");
    }

    #[test]
    fn test_load_catalog_file_missing() {
        let result = load_catalog_file("/nonexistent/agents.yaml");
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }

    #[test]
    fn test_load_catalog_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- name: [unterminated").unwrap();

        let result = load_catalog_file(file.path());
        assert!(matches!(result, Err(CatalogError::Parse { .. })));
    }
}
