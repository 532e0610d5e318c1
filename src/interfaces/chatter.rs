//! Observability ("chatter") event interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::{RoundId, SessionId};

/// Best-effort event for external monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatterEvent {
    /// A sub-task was handed to a worker.
    AgentCall {
        session_id: SessionId,
        round_id: RoundId,
        node: String,
        agent: String,
        input: Value,
        target: String,
        timestamp: DateTime<Utc>,
    },
    /// The planner produced a terminal answer.
    DirectResponse {
        session_id: SessionId,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ChatterEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ChatterEvent::AgentCall { session_id, .. } => *session_id,
            ChatterEvent::DirectResponse { session_id, .. } => *session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatterEvent::AgentCall { .. } => "agent_call",
            ChatterEvent::DirectResponse { .. } => "direct_response",
        }
    }
}

/// Errors while publishing chatter. Never affect orchestration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatterError {
    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Destination for chatter events.
///
/// Implementations:
/// - `LogChatterSink`: writes events to the tracing log
/// - `ChannelChatterSink`: broadcast channel for in-process listeners
/// - `MockChatterSink`: records events for tests
#[async_trait]
pub trait ChatterSink: Send + Sync {
    async fn publish(&self, event: ChatterEvent) -> Result<(), ChatterError>;
}
