//! Storage implementations.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::interfaces::{CompletionLedger, SessionStore};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryLedger, MemorySessionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteLedger, SqliteSessionStore};

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Process-local maps; state is lost on exit.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path.
    pub path: String,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/arbiter.db".to_string(),
            max_connections: 8,
        }
    }
}

/// Initialize storage based on configuration.
///
/// Returns tuple of (SessionStore, CompletionLedger) implementations based on
/// the configured storage type.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<(Arc<dyn SessionStore>, Arc<dyn CompletionLedger>), Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: memory");
            Ok((
                Arc::new(MemorySessionStore::new()),
                Arc::new(MemoryLedger::new()),
            ))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);

            if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(config.sqlite.max_connections)
                .connect(&format!("sqlite:{}?mode=rwc", config.sqlite.path))
                .await?;

            let session_store = Arc::new(SqliteSessionStore::new(pool.clone()));
            session_store.init().await?;

            let ledger = Arc::new(SqliteLedger::new(pool));
            ledger.init().await?;

            Ok((session_store, ledger))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default_is_memory() {
        let config = StorageConfig::default();
        assert_eq!(config.storage_type, StorageType::Memory);
        assert_eq!(config.sqlite.max_connections, 8);
    }

    #[tokio::test]
    async fn test_init_memory_storage() {
        let (sessions, _ledger) = init_storage(&StorageConfig::default()).await.unwrap();
        let id = sessions
            .create(crate::model::Turn::user_text("hello"))
            .await
            .unwrap();
        assert_eq!(sessions.load(id).await.unwrap().id, id);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_init_sqlite_storage_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("arbiter.db");
        let config = StorageConfig {
            storage_type: StorageType::Sqlite,
            sqlite: SqliteConfig {
                path: path.display().to_string(),
                max_connections: 2,
            },
        };

        let (sessions, ledger) = init_storage(&config).await.unwrap();
        let id = sessions
            .create(crate::model::Turn::user_text("hello"))
            .await
            .unwrap();
        let round_id = ledger
            .open_round(id, &["n".to_string()].into_iter().collect())
            .await
            .unwrap();
        assert!(ledger.get_round(round_id).await.is_ok());
        assert!(path.exists());
    }
}
