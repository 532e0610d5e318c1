//! Orchestration data model.
//!
//! Sessions hold the evolving conversation; rounds track one fan-out's
//! per-node completion state. Dispatch messages and completion
//! notifications are the ephemeral payloads exchanged with workers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from the hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

opaque_id!(SessionId, "Identifier of an orchestration session.");
opaque_id!(RoundId, "Identifier of a single fan-out/fan-in round.");

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A planner-requested delegation: run `agent` with `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskInvocation {
    /// Per-call correlation id assigned by the planner.
    pub id: String,
    /// Agent identity, resolved to a delivery target by the registry.
    pub agent: String,
    pub input: Value,
}

impl SubtaskInvocation {
    pub fn new(id: impl Into<String>, agent: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            input,
        }
    }

    /// Node name of this invocation within its round.
    ///
    /// Derived only from the agent and the planner-assigned id, so the same
    /// invocation always maps to the same ledger node.
    pub fn node_name(&self) -> String {
        format!("{}_{}", self.agent, self.id)
    }
}

/// Result reported back for one node of a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub invocation_id: String,
    pub node: String,
    pub result: Value,
}

/// One block of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Invocation(SubtaskInvocation),
    Result(SubtaskResult),
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn invocations(&self) -> impl Iterator<Item = &SubtaskInvocation> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Invocation(invocation) => Some(invocation),
            _ => None,
        })
    }

    /// Concatenated text blocks of this turn.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Persisted state of one orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationSession {
    pub id: SessionId,
    /// Append-only conversation history.
    pub conversation: Vec<Turn>,
    /// In-flight round, absent when no fan-out is pending.
    pub active_round_id: Option<RoundId>,
    pub created_at: DateTime<Utc>,
}

impl OrchestrationSession {
    pub fn new(initial_turn: Turn) -> Self {
        Self {
            id: SessionId::new(),
            conversation: vec![initial_turn],
            active_round_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.conversation.last()
    }
}

/// Completion state of one node in a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub completed: bool,
    pub result: Option<Value>,
}

/// Ledger entry for one fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRound {
    pub id: RoundId,
    pub session_id: SessionId,
    pub nodes: BTreeMap<String, NodeState>,
    /// Set once by the call that observed the last node complete.
    pub sealed: bool,
    pub created_at: DateTime<Utc>,
}

impl CompletionRound {
    pub fn is_complete(&self) -> bool {
        self.nodes.values().all(|node| node.completed)
    }

    pub fn pending_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, state)| !state.completed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Results keyed by node name; nodes without a result map to `null`.
    pub fn results(&self) -> BTreeMap<String, Value> {
        self.nodes
            .iter()
            .map(|(name, state)| (name.clone(), state.result.clone().unwrap_or(Value::Null)))
            .collect()
    }
}

/// Message sent to a worker for one delegated sub-task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub session_id: SessionId,
    pub round_id: RoundId,
    pub node_name: String,
    pub input: Value,
}

/// Worker report for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotification {
    pub session_id: SessionId,
    pub round_id: RoundId,
    pub node_name: String,
    pub result: Value,
}

impl CompletionNotification {
    /// Notification answering a dispatched message.
    pub fn for_message(message: &DispatchMessage, result: Value) -> Self {
        Self {
            session_id: message.session_id,
            round_id: message.round_id,
            node_name: message.node_name.clone(),
            result,
        }
    }
}

/// Result value recorded for a node that failed without a worker report.
pub fn error_result(message: impl fmt::Display) -> Value {
    serde_json::json!({ "error": message.to_string() })
}
