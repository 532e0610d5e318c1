//! Sub-task dispatch.
//!
//! Resolves the agent to a delivery target, sends the dispatch message with
//! retry on transient queue failures, then emits an `AgentCall` chatter event.

use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::interfaces::{
    AgentRegistry, ChatterEvent, ChatterSink, QueueError, RegistryError, WorkQueue,
};
use crate::model::{DispatchMessage, RoundId, SessionId};
use crate::utils::retry::dispatch_backoff;

/// Why a sub-task could not be handed to a worker.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Sends one message per delegated sub-task.
pub struct Dispatcher {
    registry: Arc<dyn AgentRegistry>,
    queue: Arc<dyn WorkQueue>,
    chatter: Arc<dyn ChatterSink>,
    backoff: ExponentialBuilder,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        queue: Arc<dyn WorkQueue>,
        chatter: Arc<dyn ChatterSink>,
    ) -> Self {
        Self {
            registry,
            queue,
            chatter,
            backoff: dispatch_backoff(),
        }
    }

    /// Override the send retry policy.
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    #[tracing::instrument(name = "dispatcher.dispatch", skip(self, input), fields(%session_id, %round_id))]
    pub async fn dispatch(
        &self,
        session_id: SessionId,
        round_id: RoundId,
        node_name: &str,
        agent: &str,
        input: Value,
    ) -> Result<(), DispatchError> {
        let target = self.registry.resolve(agent).await?;

        let message = DispatchMessage {
            session_id,
            round_id,
            node_name: node_name.to_string(),
            input: input.clone(),
        };

        (|| async { self.queue.send(&target, message.clone()).await })
            .retry(self.backoff)
            .when(QueueError::is_retryable)
            .notify(|err: &QueueError, dur| {
                warn!(target = %target, error = %err, delay = ?dur, "Queue send failed, retrying");
            })
            .await?;

        debug!(target = %target, "Sub-task dispatched");

        let event = ChatterEvent::AgentCall {
            session_id,
            round_id,
            node: node_name.to_string(),
            agent: agent.to_string(),
            input,
            target: target.to_string(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.chatter.publish(event).await {
            warn!(error = %e, "Failed to publish agent call chatter");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
