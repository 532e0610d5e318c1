//! SQLite SessionStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};

use crate::interfaces::session_store::{Result, SessionStore, StorageError};
use crate::model::{OrchestrationSession, RoundId, SessionId, Turn};
use crate::storage::schema::{Sessions, CREATE_SESSIONS_TABLE};

/// SQLite implementation of SessionStore.
///
/// The conversation is stored as a JSON document per session.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new SQLite session store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_SESSIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, initial_turn: Turn) -> Result<SessionId> {
        let session = OrchestrationSession::new(initial_turn);
        self.save(&session).await?;
        Ok(session.id)
    }

    async fn load(&self, session_id: SessionId) -> Result<OrchestrationSession> {
        let query = Query::select()
            .columns([
                Sessions::Conversation,
                Sessions::ActiveRoundId,
                Sessions::CreatedAt,
            ])
            .from(Sessions::Table)
            .and_where(Expr::col(Sessions::SessionId).eq(session_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(session_id))?;

        let conversation: String = row.try_get("conversation")?;
        let active_round_id: Option<String> = row.try_get("active_round_id")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(OrchestrationSession {
            id: session_id,
            conversation: serde_json::from_str(&conversation)?,
            active_round_id: active_round_id
                .as_deref()
                .map(RoundId::parse)
                .transpose()?,
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)?
                .with_timezone(&chrono::Utc),
        })
    }

    async fn save(&self, session: &OrchestrationSession) -> Result<()> {
        let conversation = serde_json::to_string(&session.conversation)?;
        let active_round_id = session.active_round_id.map(|id| id.to_string());
        let updated_at = chrono::Utc::now().to_rfc3339();

        let query = Query::insert()
            .into_table(Sessions::Table)
            .columns([
                Sessions::SessionId,
                Sessions::Conversation,
                Sessions::ActiveRoundId,
                Sessions::CreatedAt,
                Sessions::UpdatedAt,
            ])
            .values_panic([
                session.id.to_string().into(),
                conversation.into(),
                active_round_id.into(),
                session.created_at.to_rfc3339().into(),
                updated_at.into(),
            ])
            .on_conflict(
                OnConflict::column(Sessions::SessionId)
                    .update_columns([
                        Sessions::Conversation,
                        Sessions::ActiveRoundId,
                        Sessions::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;

        Ok(())
    }
}
