//! Deadline scheduler for completion rounds.
//!
//! A round whose worker never reports would stall its session forever. The
//! scheduler bounds that: it periodically asks the ledger for unsealed
//! rounds older than the configured timeout and injects a synthetic error
//! completion for every node still pending. The injected completions go
//! through the normal inbound path, so the round finishes and planning
//! resumes exactly as if the workers had reported failures themselves.
//! A round with nothing pending that is still unsealed gets one of its
//! completions redelivered, which lets the ledger seal it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::handlers::{Coordinator, InboundEvent};
use crate::interfaces::{CompletionLedger, StaleRound, StorageError};
use crate::model::{error_result, CompletionNotification};

/// Deadline enforcement configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Maximum age of an open round. `None` disables the scheduler.
    pub round_timeout_secs: Option<u64>,
    /// How often to check for expired rounds.
    pub check_interval_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            round_timeout_secs: None,
            check_interval_secs: 5,
        }
    }
}

/// Deadline scheduler service.
pub struct DeadlineScheduler {
    round_timeout: Duration,
    check_interval: Duration,
    ledger: Arc<dyn CompletionLedger>,
    coordinator: Arc<Coordinator>,
}

impl DeadlineScheduler {
    pub fn new(
        round_timeout: Duration,
        check_interval: Duration,
        ledger: Arc<dyn CompletionLedger>,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            round_timeout,
            check_interval,
            ledger,
            coordinator,
        }
    }

    /// Build from configuration; `None` when deadlines are disabled.
    pub fn from_config(
        config: &DeadlineConfig,
        ledger: Arc<dyn CompletionLedger>,
        coordinator: Arc<Coordinator>,
    ) -> Option<Self> {
        config.round_timeout_secs.map(|secs| {
            Self::new(
                Duration::from_secs(secs),
                Duration::from_secs(config.check_interval_secs.max(1)),
                ledger,
                coordinator,
            )
        })
    }

    /// Run the scheduler loop.
    ///
    /// This runs indefinitely, checking for expired rounds at the configured interval.
    pub async fn run(&self) {
        info!(
            round_timeout = ?self.round_timeout,
            check_interval = ?self.check_interval,
            "Starting deadline scheduler"
        );

        let mut ticker = interval(self.check_interval);
        loop {
            ticker.tick().await;
            self.check_once().await;
        }
    }

    /// Expire every overdue round once. Returns the number of nodes failed.
    pub async fn check_once(&self) -> usize {
        let timeout = match chrono::Duration::from_std(self.round_timeout) {
            Ok(timeout) => timeout,
            Err(e) => {
                error!(error = %e, "Round timeout out of range");
                return 0;
            }
        };

        let stale = match self.ledger.stale_rounds(Utc::now() - timeout).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "Failed to query stale rounds");
                return 0;
            }
        };

        if !stale.is_empty() {
            info!(count = stale.len(), "Found expired rounds");
        }

        let mut expired = 0;
        for round in stale {
            expired += self.expire(round).await;
        }
        expired
    }

    async fn expire(&self, round: StaleRound) -> usize {
        if round.pending_nodes.is_empty() {
            self.settle(&round).await;
            return 0;
        }

        let mut expired = 0;

        for node in &round.pending_nodes {
            let notification = CompletionNotification {
                session_id: round.session_id,
                round_id: round.round_id,
                node_name: node.clone(),
                result: error_result("deadline exceeded"),
            };

            debug!(
                session_id = %round.session_id,
                round_id = %round.round_id,
                node = %node,
                "Injecting deadline completion"
            );

            match self
                .coordinator
                .handle(InboundEvent::Completion(notification))
                .await
            {
                Ok(_) => expired += 1,
                Err(e) if e.is_stale_reference() => {
                    // The session no longer points at this round; seal it
                    // directly so it stops showing up as stale.
                    self.retire(&round).await;
                    return expired;
                }
                Err(e) => {
                    error!(
                        round_id = %round.round_id,
                        node = %node,
                        error = %e,
                        "Failed to inject deadline completion"
                    );
                }
            }
        }

        expired
    }

    /// Every node reported but the seal never landed. Redelivering one
    /// completed node lets the ledger seal the round and resume the session.
    async fn settle(&self, round: &StaleRound) {
        let node = match self.ledger.get_round(round.round_id).await {
            Ok(full) => match full.nodes.into_keys().next() {
                Some(node) => node,
                None => return,
            },
            Err(e) => {
                warn!(round_id = %round.round_id, error = %e, "Failed to load unsealed round");
                return;
            }
        };

        info!(round_id = %round.round_id, "Settling fully reported round");
        let notification = CompletionNotification {
            session_id: round.session_id,
            round_id: round.round_id,
            node_name: node.clone(),
            result: Value::Null,
        };

        match self
            .coordinator
            .handle(InboundEvent::Completion(notification))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_stale_reference() => {
                if let Err(e) = self
                    .ledger
                    .record_completion(round.round_id, &node, Value::Null)
                    .await
                {
                    warn!(round_id = %round.round_id, error = %e, "Failed to seal orphaned round");
                }
            }
            Err(e) => {
                error!(round_id = %round.round_id, error = %e, "Failed to settle round");
            }
        }
    }

    async fn retire(&self, round: &StaleRound) {
        info!(round_id = %round.round_id, "Retiring orphaned round");
        for node in &round.pending_nodes {
            let result = self
                .ledger
                .record_completion(round.round_id, node, error_result("round orphaned"))
                .await;
            if let Err(e) = result {
                if !matches!(e, StorageError::UnknownRound(_)) {
                    warn!(round_id = %round.round_id, node = %node, error = %e, "Failed to retire node");
                }
            }
        }
    }
}
