//! Fan-out/fan-in orchestration.
//!
//! - `controller`: the planning loop (`PLANNING -> AWAITING_COMPLETIONS -> ... -> DONE`)
//! - `dispatcher`: resolves agents and sends one message per sub-task
//! - `aggregator`: applies worker completions to the ledger
//! - `planner`: planner decorators (retry) and a scripted planner for tests

pub mod aggregator;
pub mod controller;
pub mod dispatcher;
pub mod planner;

pub use aggregator::{CompletionAggregator, RoundCompletion};
pub use controller::{merge_results, OrchestrationController};
pub use dispatcher::{DispatchError, Dispatcher};
pub use planner::{RetryingPlanner, ScriptedPlanner};

use crate::interfaces::{PlannerError, StorageError};
use crate::model::{RoundId, SessionId};

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Errors surfaced to the caller of an orchestration step.
///
/// Dispatch failures never appear here: they are recorded as error results
/// on the affected node so the round still converges.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),
}

impl OrchestrationError {
    /// The triggering event referenced a session, round or node that is not
    /// (or no longer) tracked. Such events are dropped, not retried.
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, OrchestrationError::Storage(e) if e.is_stale_reference())
    }
}

/// Where a session stands after an orchestration step.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The planner answered; the session is done.
    Answered { session_id: SessionId, text: String },
    /// A round is in flight; the session resumes when it completes.
    Awaiting {
        session_id: SessionId,
        round_id: RoundId,
    },
}

impl SessionOutcome {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionOutcome::Answered { session_id, .. } => *session_id,
            SessionOutcome::Awaiting { session_id, .. } => *session_id,
        }
    }
}
