//! Completion ledger interface.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::session_store::Result;
use crate::model::{CompletionRound, RoundId, SessionId};

/// Answer to a `record_completion` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// Whether every node of the round is now completed.
    pub complete: bool,
    /// All node results, present only for the single call that finished
    /// the round. Every other call, including duplicates arriving after the
    /// round completed, sees `None`.
    pub results: Option<BTreeMap<String, Value>>,
}

impl CompletionOutcome {
    pub fn pending() -> Self {
        Self {
            complete: false,
            results: None,
        }
    }

    pub fn finished(results: BTreeMap<String, Value>) -> Self {
        Self {
            complete: true,
            results: Some(results),
        }
    }

    /// Completeness as already known, without claiming the transition.
    pub fn observed(complete: bool) -> Self {
        Self {
            complete,
            results: None,
        }
    }

    /// True for exactly one caller per round: the one that must continue.
    pub fn finished_round(&self) -> bool {
        self.results.is_some()
    }
}

/// An unsealed round older than some deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleRound {
    pub session_id: SessionId,
    pub round_id: RoundId,
    pub pending_nodes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Interface for fan-out round tracking.
///
/// The ledger is written concurrently by one caller per completing node.
/// `record_completion` must be an atomic read-modify-write: the node update,
/// the completeness check and the decision of which caller finished the
/// round happen in one step, so two nodes completing at the same instant
/// can never both believe they were last.
///
/// Implementations:
/// - `MemoryLedger`: in-process map behind a write lock
/// - `SqliteLedger`: conditional updates against SQLite
#[async_trait]
pub trait CompletionLedger: Send + Sync {
    /// Open a round with every node pre-registered as not completed.
    ///
    /// Fails with `EmptyRound` when `node_names` is empty.
    async fn open_round(
        &self,
        session_id: SessionId,
        node_names: &BTreeSet<String>,
    ) -> Result<RoundId>;

    /// Mark `node` completed with `result`.
    ///
    /// A repeated completion for an already completed node is a no-op that
    /// reports the round's current completeness. Unknown rounds and nodes
    /// fail with `UnknownRound` / `UnknownNode`.
    async fn record_completion(
        &self,
        round_id: RoundId,
        node: &str,
        result: Value,
    ) -> Result<CompletionOutcome>;

    /// Fetch a round snapshot.
    async fn get_round(&self, round_id: RoundId) -> Result<CompletionRound>;

    /// Rounds not yet sealed that were opened before `opened_before`.
    async fn stale_rounds(&self, opened_before: DateTime<Utc>) -> Result<Vec<StaleRound>>;
}
