//! Session storage interface.

use async_trait::async_trait;

use crate::model::{OrchestrationSession, RoundId, SessionId, Turn};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during session or ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Unknown round: {0}")]
    UnknownRound(RoundId),

    #[error("Unknown node '{node}' in round {round_id}")]
    UnknownNode { round_id: RoundId, node: String },

    #[error("Refusing to open a round with no nodes")]
    EmptyRound,

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Errors caused by a stale or malformed inbound event rather than
    /// by the storage backend itself.
    pub fn is_stale_reference(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_)
                | StorageError::UnknownRound(_)
                | StorageError::UnknownNode { .. }
        )
    }
}

/// Interface for orchestration session persistence.
///
/// The controller is the only writer of a session and runs at most once per
/// round, so `save` is an unconditional full overwrite.
///
/// Implementations:
/// - `MemorySessionStore`: in-process map
/// - `SqliteSessionStore`: SQLite storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a session whose conversation starts with `initial_turn`.
    async fn create(&self, initial_turn: Turn) -> Result<SessionId>;

    /// Load a session, failing with `NotFound` if absent.
    async fn load(&self, session_id: SessionId) -> Result<OrchestrationSession>;

    /// Overwrite the stored session (last writer wins).
    async fn save(&self, session: &OrchestrationSession) -> Result<()>;
}
