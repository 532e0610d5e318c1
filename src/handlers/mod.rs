//! Inbound event handling.
//!
//! The `Coordinator` is the single entry point for everything that drives a
//! session forward: new objectives, worker completions and operator replans.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::model::{CompletionNotification, SessionId};
use crate::orchestration::{CompletionAggregator, OrchestrationController, Result, SessionOutcome};

/// Events that drive orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Free-form objective starting a fresh session.
    NewObjective { task: String },
    /// A worker finished one node.
    Completion(CompletionNotification),
    /// Re-enter planning for a session whose last planning call failed.
    Replan { session_id: SessionId },
}

/// Routes inbound events to the controller and aggregator.
pub struct Coordinator {
    controller: OrchestrationController,
    aggregator: CompletionAggregator,
}

impl Coordinator {
    pub fn new(controller: OrchestrationController, aggregator: CompletionAggregator) -> Self {
        Self {
            controller,
            aggregator,
        }
    }

    /// Handle one inbound event.
    ///
    /// Returns `Ok(None)` for a completion that did not finish its round.
    /// Errors are logged and returned to the caller; completions for stale
    /// or unknown sessions, rounds or nodes are logged at `warn` and dropped.
    pub async fn handle(&self, event: InboundEvent) -> Result<Option<SessionOutcome>> {
        let result = match event {
            InboundEvent::NewObjective { task } => self.controller.start(&task).await.map(Some),
            InboundEvent::Completion(notification) => self.complete(notification).await,
            InboundEvent::Replan { session_id } => {
                self.controller.replan(session_id).await.map(Some)
            }
        };

        match &result {
            Ok(Some(outcome)) => {
                info!(session_id = %outcome.session_id(), ?outcome, "Session advanced")
            }
            Ok(None) => {}
            Err(e) if e.is_stale_reference() => warn!(error = %e, "Stale event dropped"),
            Err(e) => error!(error = %e, "Event handling failed"),
        }

        result
    }

    async fn complete(&self, notification: CompletionNotification) -> Result<Option<SessionOutcome>> {
        match self.aggregator.handle(notification).await? {
            Some(completion) => self.controller.resume(completion).await.map(Some),
            None => Ok(None),
        }
    }
}
