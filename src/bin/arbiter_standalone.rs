//! arbiter-standalone: single-process fan-out/fan-in orchestration
//!
//! Runs the coordinator, storage, the in-process work queue and one echo
//! worker per configured agent, then drives one objective to its answer.
//!
//! ## Usage
//! ```text
//! arbiter-standalone [--config path.yaml] [--timeout-secs N] <objective...>
//! ```
//!
//! ## Configuration
//! ```yaml
//! storage:
//!   type: sqlite
//!   sqlite:
//!     path: ./data/arbiter.db
//!
//! agents:
//!   - name: researcher
//!     description: Finds sources for a question
//!     target: { type: queue, name: research }
//!   - name: writer
//!     description: Drafts prose
//!     target: { type: queue, name: writing }
//!
//! deadlines:
//!   round_timeout_secs: 30
//!   check_interval_secs: 5
//! ```

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use arbiter::config::Config;
use arbiter::standalone::RuntimeBuilder;
use arbiter::utils::bootstrap::init_tracing;

/// Drive one objective through planning and delegation.
#[derive(Parser, Debug)]
#[command(name = "arbiter-standalone")]
#[command(about = "Single-process fan-out/fan-in orchestration")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Seconds to wait for an answer before giving up
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Objective text; words are joined with spaces
    #[arg(required = true)]
    objective: Vec<String>,
}

impl Args {
    fn objective(&self) -> String {
        self.objective.join(" ")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let config = Config::load(args.config.as_deref())?;
    info!(
        storage = ?config.storage.storage_type,
        agents = config.agents.len(),
        "Configuration loaded"
    );

    let mut runtime = RuntimeBuilder::from_config(&config)?
        .with_echo_workers()
        .build()
        .await?;
    runtime.start();

    let timeout = Duration::from_secs(args.timeout_secs);
    match runtime.run_objective(&args.objective(), timeout).await {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Objective failed");
            Err(e.into())
        }
    }
}
