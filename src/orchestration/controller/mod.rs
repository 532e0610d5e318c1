//! Orchestration controller.
//!
//! Drives one session through `PLANNING -> AWAITING_COMPLETIONS -> PLANNING
//! -> ... -> DONE`. The controller never waits on a round: after dispatch it
//! returns `SessionOutcome::Awaiting`, and planning resumes only when the
//! aggregator reports the completion that finished the round.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use super::aggregator::RoundCompletion;
use super::dispatcher::Dispatcher;
use super::{Result, SessionOutcome};
use crate::interfaces::{
    AgentRegistry, ChatterEvent, ChatterSink, CompletionLedger, Planner, PlannerDecision,
    PlannerError, SessionStore, StorageError,
};
use crate::model::{
    error_result, ContentBlock, OrchestrationSession, Role, RoundId, SessionId,
    SubtaskInvocation, SubtaskResult, Turn,
};

/// Result of opening a round and dispatching its sub-tasks.
enum FanOut {
    Awaiting(RoundId),
    /// Every node failed to dispatch, so the controller finished the round.
    Finished(BTreeMap<String, Value>),
}

/// Append a round's results as one user turn and clear the active round.
///
/// Results are ordered by node name, so the turn is identical for any
/// arrival order of the completions.
pub fn merge_results(session: &mut OrchestrationSession, results: BTreeMap<String, Value>) {
    let invocation_ids: HashMap<String, String> = session
        .conversation
        .iter()
        .rev()
        .find(|turn| turn.role == Role::Assistant && turn.invocations().next().is_some())
        .map(|turn| {
            turn.invocations()
                .map(|invocation| (invocation.node_name(), invocation.id.clone()))
                .collect()
        })
        .unwrap_or_default();

    let content = results
        .into_iter()
        .map(|(node, result)| {
            ContentBlock::Result(SubtaskResult {
                invocation_id: invocation_ids.get(&node).cloned().unwrap_or_default(),
                node,
                result,
            })
        })
        .collect();

    session.conversation.push(Turn {
        role: Role::User,
        content,
    });
    session.active_round_id = None;
}

/// The planning loop for orchestration sessions.
pub struct OrchestrationController {
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn CompletionLedger>,
    planner: Arc<dyn Planner>,
    registry: Arc<dyn AgentRegistry>,
    dispatcher: Dispatcher,
    chatter: Arc<dyn ChatterSink>,
}

impl OrchestrationController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn CompletionLedger>,
        planner: Arc<dyn Planner>,
        registry: Arc<dyn AgentRegistry>,
        dispatcher: Dispatcher,
        chatter: Arc<dyn ChatterSink>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            planner,
            registry,
            dispatcher,
            chatter,
        }
    }

    /// Start a new session for an objective and plan its first step.
    #[tracing::instrument(name = "controller.start", skip_all)]
    pub async fn start(&self, task: &str) -> Result<SessionOutcome> {
        let session_id = self.sessions.create(Turn::user_text(task)).await?;
        info!(%session_id, "Session created");

        let session = self.sessions.load(session_id).await?;
        self.run(session).await
    }

    /// Fold a finished round into its session and plan the next step.
    #[tracing::instrument(
        name = "controller.resume",
        skip_all,
        fields(session_id = %completion.session_id, round_id = %completion.round_id)
    )]
    pub async fn resume(&self, completion: RoundCompletion) -> Result<SessionOutcome> {
        let mut session = self.sessions.load(completion.session_id).await?;
        if session.active_round_id != Some(completion.round_id) {
            return Err(StorageError::UnknownRound(completion.round_id).into());
        }

        merge_results(&mut session, completion.results);
        self.sessions.save(&session).await?;
        info!("Round results merged");

        self.run(session).await
    }

    /// Re-enter planning for an existing session.
    ///
    /// Recovers a session whose last planning call failed: a sealed active
    /// round is merged first, an open one is still awaited, and a session
    /// that already answered reports its answer again.
    #[tracing::instrument(name = "controller.replan", skip(self))]
    pub async fn replan(&self, session_id: SessionId) -> Result<SessionOutcome> {
        let mut session = self.sessions.load(session_id).await?;

        if let Some(round_id) = session.active_round_id {
            let round = self.ledger.get_round(round_id).await?;
            if !round.sealed {
                return Ok(SessionOutcome::Awaiting {
                    session_id,
                    round_id,
                });
            }
            merge_results(&mut session, round.results());
            self.sessions.save(&session).await?;
        } else if let Some(turn) = session.last_turn() {
            if turn.role == Role::Assistant && turn.invocations().next().is_none() {
                return Ok(SessionOutcome::Answered {
                    session_id,
                    text: turn.text(),
                });
            }
        }

        self.run(session).await
    }

    async fn run(&self, mut session: OrchestrationSession) -> Result<SessionOutcome> {
        loop {
            let agents = self.registry.catalog().await;
            let decision = self
                .planner
                .decide(&session.conversation, &agents)
                .await
                .map_err(|e| {
                    error!(session_id = %session.id, error = %e, "Planner failed");
                    e
                })?;

            let invocations = match decision {
                PlannerDecision::Answer { text } => return self.finish(session, text).await,
                PlannerDecision::Delegate { invocations } if invocations.is_empty() => {
                    return self.finish(session, String::new()).await
                }
                PlannerDecision::Delegate { invocations } => invocations,
            };

            match self.fan_out(&mut session, invocations).await? {
                FanOut::Awaiting(round_id) => {
                    return Ok(SessionOutcome::Awaiting {
                        session_id: session.id,
                        round_id,
                    })
                }
                FanOut::Finished(results) => {
                    merge_results(&mut session, results);
                    self.sessions.save(&session).await?;
                }
            }
        }
    }

    async fn finish(&self, mut session: OrchestrationSession, text: String) -> Result<SessionOutcome> {
        session.conversation.push(Turn::assistant_text(text.clone()));
        session.active_round_id = None;
        self.sessions.save(&session).await?;
        info!(session_id = %session.id, "Session answered");

        let event = ChatterEvent::DirectResponse {
            session_id: session.id,
            message: text.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.chatter.publish(event).await {
            warn!(session_id = %session.id, error = %e, "Failed to publish direct response chatter");
        }

        Ok(SessionOutcome::Answered {
            session_id: session.id,
            text,
        })
    }

    async fn fan_out(
        &self,
        session: &mut OrchestrationSession,
        invocations: Vec<SubtaskInvocation>,
    ) -> Result<FanOut> {
        let node_names: BTreeSet<String> =
            invocations.iter().map(SubtaskInvocation::node_name).collect();
        if node_names.len() != invocations.len() {
            return Err(PlannerError::InvalidDecision(
                "invocations must have distinct agent and id pairs".to_string(),
            )
            .into());
        }

        let round_id = self.ledger.open_round(session.id, &node_names).await?;

        // Persist the round pointer before any worker can report against it
        session.conversation.push(Turn {
            role: Role::Assistant,
            content: invocations
                .iter()
                .cloned()
                .map(ContentBlock::Invocation)
                .collect(),
        });
        session.active_round_id = Some(round_id);
        self.sessions.save(session).await?;

        info!(
            session_id = %session.id,
            %round_id,
            nodes = node_names.len(),
            "Round opened"
        );

        let mut finished = None;
        for invocation in invocations {
            let node = invocation.node_name();
            let dispatched = self
                .dispatcher
                .dispatch(session.id, round_id, &node, &invocation.agent, invocation.input)
                .await;

            if let Err(e) = dispatched {
                warn!(%round_id, node = %node, error = %e, "Dispatch failed, recording error result");
                let outcome = self
                    .ledger
                    .record_completion(round_id, &node, error_result(&e))
                    .await?;
                if outcome.results.is_some() {
                    finished = outcome.results;
                }
            }
        }

        Ok(match finished {
            Some(results) => FanOut::Finished(results),
            None => FanOut::Awaiting(round_id),
        })
    }
}
