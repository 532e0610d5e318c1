//! Standalone runtime for running arbiter as a single process.
//!
//! Wires storage, the channel work queue, the agent registry, chatter and a
//! planner into one `Coordinator`. Echo workers and the echo planner make a
//! complete fan-out/fan-in runnable without any external collaborator.
//!
//! # Example
//!
//! ```ignore
//! use arbiter::discovery::AgentConfig;
//! use arbiter::standalone::RuntimeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = RuntimeBuilder::new()
//!         .register_agent(AgentConfig::active("researcher", "Finds sources", "research"))
//!         .with_echo_workers()
//!         .build()
//!         .await?;
//!
//!     runtime.start();
//!     let answer = runtime.run_objective("summarise", std::time::Duration::from_secs(5)).await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

mod builder;
mod echo;
mod runtime;

pub use builder::RuntimeBuilder;
pub use echo::{EchoPlanner, EchoWorker};
pub use runtime::{Runtime, RuntimeError};
