//! Abstract interfaces for arbiter components.
//!
//! These traits define the contracts for:
//! - Session storage (conversation persistence)
//! - Completion ledger (per-round node completion state)
//! - Work queue (delivery of sub-tasks to workers)
//! - Agent registry (agent identity to delivery target)
//! - Planner (the external decision-making call)
//! - Chatter sink (best-effort observability events)

pub mod chatter;
pub mod ledger;
pub mod planner;
pub mod registry;
pub mod session_store;
pub mod work_queue;

pub use chatter::{ChatterError, ChatterEvent, ChatterSink};
pub use ledger::{CompletionLedger, CompletionOutcome, StaleRound};
pub use planner::{Planner, PlannerDecision, PlannerError};
pub use registry::{AgentRegistry, AgentSpec, DeliveryTarget, RegistryError};
pub use session_store::{SessionStore, StorageError};
pub use work_queue::{MessageHandler, QueueError, WorkQueue};
