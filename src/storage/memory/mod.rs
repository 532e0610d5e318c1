//! In-memory storage implementations.
//!
//! Used by the standalone runtime and tests. State lives for the lifetime
//! of the process.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::ledger::{CompletionLedger, CompletionOutcome, StaleRound};
use crate::interfaces::session_store::{Result, SessionStore, StorageError};
use crate::model::{
    CompletionRound, NodeState, OrchestrationSession, RoundId, SessionId, Turn,
};

/// Session store backed by a map.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, OrchestrationSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, initial_turn: Turn) -> Result<SessionId> {
        let session = OrchestrationSession::new(initial_turn);
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        Ok(id)
    }

    async fn load(&self, session_id: SessionId) -> Result<OrchestrationSession> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(StorageError::NotFound(session_id))
    }

    async fn save(&self, session: &OrchestrationSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }
}

/// Completion ledger backed by a map.
///
/// Every mutation holds the write lock across the node update, the
/// completeness check and the seal, which makes `record_completion` atomic.
#[derive(Default)]
pub struct MemoryLedger {
    rounds: RwLock<HashMap<RoundId, CompletionRound>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds ever opened.
    pub async fn round_count(&self) -> usize {
        self.rounds.read().await.len()
    }

    /// Open a round with an explicit creation time (deadline tests).
    pub async fn open_round_at(
        &self,
        session_id: SessionId,
        node_names: &BTreeSet<String>,
        created_at: DateTime<Utc>,
    ) -> Result<RoundId> {
        if node_names.is_empty() {
            return Err(StorageError::EmptyRound);
        }

        let round = CompletionRound {
            id: RoundId::new(),
            session_id,
            nodes: node_names
                .iter()
                .map(|name| (name.clone(), NodeState::default()))
                .collect::<BTreeMap<_, _>>(),
            sealed: false,
            created_at,
        };
        let id = round.id;
        self.rounds.write().await.insert(id, round);
        Ok(id)
    }
}

#[async_trait]
impl CompletionLedger for MemoryLedger {
    async fn open_round(
        &self,
        session_id: SessionId,
        node_names: &BTreeSet<String>,
    ) -> Result<RoundId> {
        self.open_round_at(session_id, node_names, Utc::now()).await
    }

    async fn record_completion(
        &self,
        round_id: RoundId,
        node: &str,
        result: Value,
    ) -> Result<CompletionOutcome> {
        let mut rounds = self.rounds.write().await;
        let round = rounds
            .get_mut(&round_id)
            .ok_or(StorageError::UnknownRound(round_id))?;

        let state = round
            .nodes
            .get_mut(node)
            .ok_or_else(|| StorageError::UnknownNode {
                round_id,
                node: node.to_string(),
            })?;

        if state.completed {
            debug!(%round_id, %node, "Duplicate completion ignored");
        } else {
            state.completed = true;
            state.result = Some(result);
        }

        if round.is_complete() && !round.sealed {
            round.sealed = true;
            return Ok(CompletionOutcome::finished(round.results()));
        }

        Ok(CompletionOutcome::observed(round.is_complete()))
    }

    async fn get_round(&self, round_id: RoundId) -> Result<CompletionRound> {
        self.rounds
            .read()
            .await
            .get(&round_id)
            .cloned()
            .ok_or(StorageError::UnknownRound(round_id))
    }

    async fn stale_rounds(&self, opened_before: DateTime<Utc>) -> Result<Vec<StaleRound>> {
        let rounds = self.rounds.read().await;
        let mut stale: Vec<StaleRound> = rounds
            .values()
            .filter(|round| !round.sealed && round.created_at < opened_before)
            .map(|round| StaleRound {
                session_id: round.session_id,
                round_id: round.id,
                pending_nodes: round.pending_nodes(),
                created_at: round.created_at,
            })
            .collect();
        stale.sort_by_key(|round| round.created_at);
        Ok(stale)
    }
}
