//! Arbiter - fan-out/fan-in orchestration coordinator
//!
//! A planner breaks an objective into sub-tasks, arbiter dispatches them to
//! independent workers, tracks their completions in a shared ledger and
//! resumes planning exactly once, when the last sub-task of a round reports.

pub mod bus;
pub mod config;
pub mod discovery;
pub mod handlers;
pub mod interfaces;
pub mod model;
pub mod orchestration;
pub mod services;
#[cfg(feature = "standalone")]
pub mod standalone;
pub mod storage;
pub mod utils;
