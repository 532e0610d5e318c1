//! Planner decorators.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tokio::sync::Mutex;
use tracing::warn;

use crate::interfaces::{AgentSpec, Planner, PlannerDecision, PlannerError};
use crate::model::Turn;
use crate::utils::retry::planner_backoff;

/// Retries a planner's transient failures with exponential backoff.
///
/// Invalid decisions are returned immediately.
pub struct RetryingPlanner {
    inner: Arc<dyn Planner>,
    backoff: ExponentialBuilder,
}

impl RetryingPlanner {
    pub fn new(inner: Arc<dyn Planner>) -> Self {
        Self {
            inner,
            backoff: planner_backoff(),
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl Planner for RetryingPlanner {
    async fn decide(
        &self,
        conversation: &[Turn],
        agents: &[AgentSpec],
    ) -> Result<PlannerDecision, PlannerError> {
        (|| async { self.inner.decide(conversation, agents).await })
            .retry(self.backoff)
            .when(PlannerError::is_retryable)
            .notify(|err: &PlannerError, dur| {
                warn!(error = %err, delay = ?dur, "Planner call failed, retrying");
            })
            .await
    }
}

/// Planner that replays a fixed sequence of decisions.
///
/// Every call consumes the next scripted response and records the
/// conversation it was given. Calls past the end of the script fail.
#[derive(Default)]
pub struct ScriptedPlanner {
    script: Mutex<VecDeque<Result<PlannerDecision, PlannerError>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedPlanner {
    pub fn new(script: impl IntoIterator<Item = Result<PlannerDecision, PlannerError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append a response to the script.
    pub async fn push(&self, response: Result<PlannerDecision, PlannerError>) {
        self.script.lock().await.push_back(response);
    }

    /// Conversations seen so far, one per call.
    pub async fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn decide(
        &self,
        conversation: &[Turn],
        _agents: &[AgentSpec],
    ) -> Result<PlannerDecision, PlannerError> {
        self.calls.lock().await.push(conversation.to_vec());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(PlannerError::Failed("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fast_backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_max_times(3)
    }

    fn answer(text: &str) -> Result<PlannerDecision, PlannerError> {
        Ok(PlannerDecision::Answer {
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_scripted_planner_replays_in_order() {
        let planner = ScriptedPlanner::new([answer("one"), answer("two")]);
        let conversation = vec![Turn::user_text("hi")];

        assert_eq!(planner.decide(&conversation, &[]).await.unwrap(), answer("one").unwrap());
        assert_eq!(planner.decide(&conversation, &[]).await.unwrap(), answer("two").unwrap());
        assert!(planner.decide(&conversation, &[]).await.is_err());
        assert_eq!(planner.call_count().await, 3);
        assert_eq!(planner.calls().await[0], conversation);
    }

    #[tokio::test]
    async fn test_retrying_planner_retries_failures() {
        let inner = Arc::new(ScriptedPlanner::new([
            Err(PlannerError::Failed("throttled".to_string())),
            Err(PlannerError::Failed("throttled".to_string())),
            answer("finally"),
        ]));
        let planner = RetryingPlanner::new(inner.clone()).with_backoff(fast_backoff());

        let decision = planner.decide(&[Turn::user_text("hi")], &[]).await.unwrap();
        assert_eq!(decision, answer("finally").unwrap());
        assert_eq!(inner.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_retrying_planner_does_not_retry_invalid_decision() {
        let inner = Arc::new(ScriptedPlanner::new([
            Err(PlannerError::InvalidDecision("bad tool call".to_string())),
            answer("unreached"),
        ]));
        let planner = RetryingPlanner::new(inner.clone()).with_backoff(fast_backoff());

        let result = planner.decide(&[Turn::user_text("hi")], &[]).await;
        assert!(matches!(result, Err(PlannerError::InvalidDecision(_))));
        assert_eq!(inner.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_retrying_planner_gives_up() {
        let inner = Arc::new(ScriptedPlanner::default());
        let planner = RetryingPlanner::new(inner.clone()).with_backoff(fast_backoff());

        let result = planner.decide(&[Turn::user_text("hi")], &[]).await;
        assert!(matches!(result, Err(PlannerError::Failed(_))));
        assert_eq!(inner.call_count().await, 4);
    }
}
