//! Echo collaborators for local runs.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::handlers::{Coordinator, InboundEvent};
use crate::interfaces::{AgentSpec, MessageHandler, Planner, PlannerDecision, PlannerError};
use crate::model::{
    CompletionNotification, ContentBlock, DispatchMessage, Role, SubtaskInvocation, Turn,
};

/// Planner that delegates the objective to every available agent once, then
/// answers with the collected results.
#[derive(Debug, Default, Clone)]
pub struct EchoPlanner;

impl EchoPlanner {
    fn summarize(turn: &Turn) -> String {
        turn.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Result(result) => {
                    Some(format!("{}: {}", result.node, result.result))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Planner for EchoPlanner {
    async fn decide(
        &self,
        conversation: &[Turn],
        agents: &[AgentSpec],
    ) -> Result<PlannerDecision, PlannerError> {
        let last = conversation
            .last()
            .ok_or_else(|| PlannerError::InvalidDecision("empty conversation".to_string()))?;

        let has_results = last
            .content
            .iter()
            .any(|block| matches!(block, ContentBlock::Result(_)));
        if has_results {
            return Ok(PlannerDecision::Answer {
                text: Self::summarize(last),
            });
        }

        if agents.is_empty() {
            return Ok(PlannerDecision::Answer {
                text: "No agents available".to_string(),
            });
        }

        let round = conversation
            .iter()
            .filter(|turn| turn.role == Role::Assistant)
            .count()
            + 1;
        let task = last.text();

        Ok(PlannerDecision::Delegate {
            invocations: agents
                .iter()
                .map(|agent| {
                    SubtaskInvocation::new(
                        format!("call{}", round),
                        &agent.name,
                        json!({ "task": task }),
                    )
                })
                .collect(),
        })
    }
}

/// Worker that answers every message with its own input.
///
/// Reports straight back into the coordinator, standing in for a remote
/// worker posting a completion event.
#[derive(Clone)]
pub struct EchoWorker {
    agent: String,
    coordinator: Arc<Coordinator>,
}

impl EchoWorker {
    pub fn new(agent: impl Into<String>, coordinator: Arc<Coordinator>) -> Self {
        Self {
            agent: agent.into(),
            coordinator,
        }
    }

    fn reply(&self, input: &Value) -> Value {
        json!({ "agent": self.agent, "echo": input })
    }
}

impl MessageHandler for EchoWorker {
    fn handle(&self, message: DispatchMessage) -> BoxFuture<'static, ()> {
        let notification =
            CompletionNotification::for_message(&message, self.reply(&message.input));
        let coordinator = self.coordinator.clone();
        let agent = self.agent.clone();

        Box::pin(async move {
            debug!(agent = %agent, node = %notification.node_name, "Echo worker replying");
            if let Err(e) = coordinator
                .handle(InboundEvent::Completion(notification))
                .await
            {
                warn!(agent = %agent, error = %e, "Echo completion rejected");
            }
        })
    }
}
