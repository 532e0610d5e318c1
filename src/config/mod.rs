//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

use serde::Deserialize;

use crate::discovery::{load_catalog_file, AgentConfig, CatalogError};
use crate::services::DeadlineConfig;
use crate::storage::StorageConfig;
use crate::utils::retry::RetryPolicy;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ARBITER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ARBITER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ARBITER_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Inline agent catalog.
    pub agents: Vec<AgentConfig>,
    /// Optional YAML file with additional agents.
    pub agent_catalog: Option<String>,
    /// Round deadline enforcement.
    pub deadlines: DeadlineConfig,
    /// Retry bounds for work queue sends.
    pub dispatch: RetryPolicy,
    /// Retry bounds for planner calls.
    pub planner: RetryPolicy,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Inline agents followed by those from `agent_catalog`, if set.
    ///
    /// A catalog entry replaces an inline agent of the same name.
    pub fn agent_configs(&self) -> Result<Vec<AgentConfig>, CatalogError> {
        let mut agents = self.agents.clone();
        if let Some(path) = &self.agent_catalog {
            for agent in load_catalog_file(path)? {
                agents.retain(|existing| existing.name != agent.name);
                agents.push(agent);
            }
        }
        Ok(agents)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
