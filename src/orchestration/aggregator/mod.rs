//! Completion aggregation.
//!
//! Applies one worker report to the ledger and tells the caller whether it
//! was the one report that finished the round.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::Result;
use crate::interfaces::{CompletionLedger, SessionStore, StorageError};
use crate::model::{CompletionNotification, RoundId, SessionId};

/// A round whose last node just completed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundCompletion {
    pub session_id: SessionId,
    pub round_id: RoundId,
    /// Results keyed (and so ordered) by node name.
    pub results: BTreeMap<String, Value>,
}

/// Consumes completion notifications.
pub struct CompletionAggregator {
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn CompletionLedger>,
}

impl CompletionAggregator {
    pub fn new(sessions: Arc<dyn SessionStore>, ledger: Arc<dyn CompletionLedger>) -> Self {
        Self { sessions, ledger }
    }

    /// Record one completion.
    ///
    /// Returns `Some` for exactly one notification per round: the one whose
    /// ledger update completed it. Completions for a round other than the
    /// session's active round fail with `UnknownRound` and leave the ledger
    /// untouched.
    #[tracing::instrument(
        name = "aggregator.handle",
        skip_all,
        fields(
            session_id = %notification.session_id,
            round_id = %notification.round_id,
            node = %notification.node_name
        )
    )]
    pub async fn handle(
        &self,
        notification: CompletionNotification,
    ) -> Result<Option<RoundCompletion>> {
        let CompletionNotification {
            session_id,
            round_id,
            node_name,
            result,
        } = notification;

        let session = self.sessions.load(session_id).await?;
        if session.active_round_id != Some(round_id) {
            warn!(
                active_round_id = ?session.active_round_id,
                "Completion for inactive round rejected"
            );
            return Err(StorageError::UnknownRound(round_id).into());
        }

        let outcome = self
            .ledger
            .record_completion(round_id, &node_name, result)
            .await?;

        match outcome.results {
            Some(results) => {
                info!(nodes = results.len(), "Round complete");
                Ok(Some(RoundCompletion {
                    session_id,
                    round_id,
                    results,
                }))
            }
            None => {
                debug!(complete = outcome.complete, "Completion recorded");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests;
