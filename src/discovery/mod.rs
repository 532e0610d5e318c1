//! Agent discovery for arbiter.
//!
//! Agents are described in configuration (or a standalone catalog file) and
//! held in a [`StaticAgentRegistry`]. Only agents in the `active` state are
//! resolvable or offered to the planner.

pub mod registry;
pub mod static_config;

pub use registry::StaticAgentRegistry;
pub use static_config::{load_catalog_file, AgentConfig, AgentState, CatalogError};
