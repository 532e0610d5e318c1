//! SQLite CompletionLedger implementation.
//!
//! Each node is a row in `round_nodes`. Completion is arbitrated by two
//! conditional single-statement updates, each atomic in SQLite:
//!
//! 1. flip the node `completed = 0 -> 1` (only the first report wins)
//! 2. flip the round `sealed = 0 -> 1` only while no node is pending
//!
//! Exactly one caller observes `rows_affected == 1` on the seal, and that
//! caller alone receives the round's results. The seal is attempted after
//! duplicate reports too, so an interrupted seal is completed by the next
//! redelivery.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::interfaces::ledger::{CompletionLedger, CompletionOutcome, StaleRound};
use crate::interfaces::session_store::{Result, StorageError};
use crate::model::{CompletionRound, NodeState, RoundId, SessionId};
use crate::storage::schema::{RoundNodes, Rounds, CREATE_ROUNDS_TABLES};

/// Fixed-width UTC timestamp, so text comparison orders chronologically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite implementation of CompletionLedger.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Create a new SQLite ledger.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_ROUNDS_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    async fn round_exists(&self, round_id: RoundId) -> Result<bool> {
        let query = Query::select()
            .column(Rounds::RoundId)
            .from(Rounds::Table)
            .and_where(Expr::col(Rounds::RoundId).eq(round_id.to_string()))
            .to_string(SqliteQueryBuilder);

        Ok(sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .is_some())
    }

    async fn pending_count(&self, round_id: RoundId) -> Result<i64> {
        let query = Query::select()
            .expr(Expr::col(RoundNodes::NodeName).count())
            .from(RoundNodes::Table)
            .and_where(Expr::col(RoundNodes::RoundId).eq(round_id.to_string()))
            .and_where(Expr::col(RoundNodes::Completed).eq(0))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    async fn load_nodes(&self, round_id: RoundId) -> Result<BTreeMap<String, NodeState>> {
        let query = Query::select()
            .columns([
                RoundNodes::NodeName,
                RoundNodes::Completed,
                RoundNodes::Result,
            ])
            .from(RoundNodes::Table)
            .and_where(Expr::col(RoundNodes::RoundId).eq(round_id.to_string()))
            .order_by(RoundNodes::NodeName, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut nodes = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("node_name")?;
            let completed: i64 = row.try_get("completed")?;
            let result: Option<String> = row.try_get("result")?;
            nodes.insert(
                name,
                NodeState {
                    completed: completed != 0,
                    result: result.as_deref().map(serde_json::from_str).transpose()?,
                },
            );
        }
        Ok(nodes)
    }

    /// Try to claim the complete -> sealed transition for this caller.
    async fn try_seal(&self, round_id: RoundId) -> Result<bool> {
        let query = {
            let id = round_id.to_string();
            let pending = Query::select()
                .expr(Expr::val(1))
                .from(RoundNodes::Table)
                .and_where(Expr::col(RoundNodes::RoundId).eq(id.clone()))
                .and_where(Expr::col(RoundNodes::Completed).eq(0))
                .to_owned();

            Query::update()
                .table(Rounds::Table)
                .value(Rounds::Sealed, 1)
                .and_where(Expr::col(Rounds::RoundId).eq(id))
                .and_where(Expr::col(Rounds::Sealed).eq(0))
                .and_where(Expr::exists(pending).not())
                .to_string(SqliteQueryBuilder)
        };

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Seal the round if nothing is pending and report the outcome.
    ///
    /// Runs after every accepted report, duplicates included: a round whose
    /// last node was written but whose seal never landed is finished by the
    /// next report for any of its nodes.
    async fn settle(&self, round_id: RoundId) -> Result<CompletionOutcome> {
        if self.try_seal(round_id).await? {
            let results = self
                .load_nodes(round_id)
                .await?
                .into_iter()
                .map(|(name, state)| (name, state.result.unwrap_or(Value::Null)))
                .collect();
            return Ok(CompletionOutcome::finished(results));
        }

        let pending = self.pending_count(round_id).await?;
        Ok(CompletionOutcome::observed(pending == 0))
    }
}

#[async_trait]
impl CompletionLedger for SqliteLedger {
    async fn open_round(
        &self,
        session_id: SessionId,
        node_names: &BTreeSet<String>,
    ) -> Result<RoundId> {
        if node_names.is_empty() {
            return Err(StorageError::EmptyRound);
        }

        let round_id = RoundId::new();
        let id = round_id.to_string();
        let created_at = timestamp(Utc::now());

        let mut tx = self.pool.begin().await?;

        let query = Query::insert()
            .into_table(Rounds::Table)
            .columns([
                Rounds::RoundId,
                Rounds::SessionId,
                Rounds::Sealed,
                Rounds::CreatedAt,
            ])
            .values_panic([
                id.clone().into(),
                session_id.to_string().into(),
                0.into(),
                created_at.into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        // Statements hold non-Send idens, render before awaiting
        let nodes_sql = {
            let mut insert = Query::insert();
            insert.into_table(RoundNodes::Table).columns([
                RoundNodes::RoundId,
                RoundNodes::NodeName,
                RoundNodes::Completed,
            ]);
            for name in node_names {
                insert.values_panic([id.clone().into(), name.clone().into(), 0.into()]);
            }
            insert.to_string(SqliteQueryBuilder)
        };
        sqlx::query(&nodes_sql).execute(&mut *tx).await?;

        tx.commit().await?;

        debug!(%session_id, %round_id, nodes = node_names.len(), "Opened round");
        Ok(round_id)
    }

    async fn record_completion(
        &self,
        round_id: RoundId,
        node: &str,
        result: Value,
    ) -> Result<CompletionOutcome> {
        let id = round_id.to_string();
        let encoded = serde_json::to_string(&result)?;

        let query = Query::update()
            .table(RoundNodes::Table)
            .values([
                (RoundNodes::Completed, 1.into()),
                (RoundNodes::Result, encoded.into()),
            ])
            .and_where(Expr::col(RoundNodes::RoundId).eq(id.clone()))
            .and_where(Expr::col(RoundNodes::NodeName).eq(node))
            .and_where(Expr::col(RoundNodes::Completed).eq(0))
            .to_string(SqliteQueryBuilder);

        let updated = sqlx::query(&query).execute(&self.pool).await?;

        if updated.rows_affected() == 0 {
            // Either a duplicate report or a reference to something untracked
            let query = Query::select()
                .column(RoundNodes::Completed)
                .from(RoundNodes::Table)
                .and_where(Expr::col(RoundNodes::RoundId).eq(id))
                .and_where(Expr::col(RoundNodes::NodeName).eq(node))
                .to_string(SqliteQueryBuilder);

            if sqlx::query(&query)
                .fetch_optional(&self.pool)
                .await?
                .is_none()
            {
                if self.round_exists(round_id).await? {
                    return Err(StorageError::UnknownNode {
                        round_id,
                        node: node.to_string(),
                    });
                }
                return Err(StorageError::UnknownRound(round_id));
            }

            debug!(%round_id, %node, "Duplicate completion ignored");
        }

        self.settle(round_id).await
    }

    async fn get_round(&self, round_id: RoundId) -> Result<CompletionRound> {
        let query = Query::select()
            .columns([Rounds::SessionId, Rounds::Sealed, Rounds::CreatedAt])
            .from(Rounds::Table)
            .and_where(Expr::col(Rounds::RoundId).eq(round_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UnknownRound(round_id))?;

        let session_id: String = row.try_get("session_id")?;
        let sealed: i64 = row.try_get("sealed")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(CompletionRound {
            id: round_id,
            session_id: SessionId::parse(&session_id)?,
            nodes: self.load_nodes(round_id).await?,
            sealed: sealed != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        })
    }

    async fn stale_rounds(&self, opened_before: DateTime<Utc>) -> Result<Vec<StaleRound>> {
        let query = Query::select()
            .columns([Rounds::RoundId, Rounds::SessionId, Rounds::CreatedAt])
            .from(Rounds::Table)
            .and_where(Expr::col(Rounds::Sealed).eq(0))
            .and_where(Expr::col(Rounds::CreatedAt).lt(timestamp(opened_before)))
            .order_by(Rounds::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut stale = Vec::with_capacity(rows.len());
        for row in rows {
            let round_id: String = row.try_get("round_id")?;
            let session_id: String = row.try_get("session_id")?;
            let created_at: String = row.try_get("created_at")?;
            let round_id = RoundId::parse(&round_id)?;

            let pending_nodes = self
                .load_nodes(round_id)
                .await?
                .into_iter()
                .filter(|(_, state)| !state.completed)
                .map(|(name, _)| name)
                .collect();

            stale.push(StaleRound {
                session_id: SessionId::parse(&session_id)?,
                round_id,
                pending_nodes,
                created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            });
        }

        Ok(stale)
    }
}
