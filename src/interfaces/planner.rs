//! Planner interface.

use async_trait::async_trait;

use super::registry::AgentSpec;
use crate::model::{SubtaskInvocation, Turn};

/// Outcome of one planning call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerDecision {
    /// Terminal answer; no further delegation.
    Answer { text: String },
    /// Sub-tasks to fan out. An empty list behaves as `Answer` with no text.
    Delegate { invocations: Vec<SubtaskInvocation> },
}

/// Errors from the decision-making call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlannerError {
    #[error("Planner call failed: {0}")]
    Failed(String),

    #[error("Planner returned an invalid decision: {0}")]
    InvalidDecision(String),
}

impl PlannerError {
    /// Invalid decisions are deterministic for a given input; only call
    /// failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlannerError::Failed(_))
    }
}

/// The external decision-making collaborator (e.g. an LLM call).
///
/// May block for a long time. From the controller's point of view a single
/// call either returns a decision or a `PlannerError` that aborts the
/// current loop iteration.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn decide(
        &self,
        conversation: &[Turn],
        agents: &[AgentSpec],
    ) -> Result<PlannerDecision, PlannerError>;
}
