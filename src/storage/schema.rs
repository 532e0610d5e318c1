//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Sessions table schema.
#[derive(Iden)]
pub enum Sessions {
    Table,
    #[iden = "session_id"]
    SessionId,
    #[iden = "conversation"]
    Conversation,
    #[iden = "active_round_id"]
    ActiveRoundId,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Rounds table schema.
#[derive(Iden)]
pub enum Rounds {
    Table,
    #[iden = "round_id"]
    RoundId,
    #[iden = "session_id"]
    SessionId,
    #[iden = "sealed"]
    Sealed,
    #[iden = "created_at"]
    CreatedAt,
}

/// Round nodes table schema.
#[derive(Iden)]
pub enum RoundNodes {
    Table,
    #[iden = "round_id"]
    RoundId,
    #[iden = "node_name"]
    NodeName,
    #[iden = "completed"]
    Completed,
    #[iden = "result"]
    Result,
}

/// SQL for creating the sessions table.
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT NOT NULL PRIMARY KEY,
    conversation TEXT NOT NULL,
    active_round_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQL for creating the rounds and round_nodes tables.
pub const CREATE_ROUNDS_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS rounds (
    round_id TEXT NOT NULL PRIMARY KEY,
    session_id TEXT NOT NULL,
    sealed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rounds_sealed_created ON rounds(sealed, created_at);

CREATE TABLE IF NOT EXISTS round_nodes (
    round_id TEXT NOT NULL,
    node_name TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    result TEXT,
    PRIMARY KEY (round_id, node_name)
);
"#;
