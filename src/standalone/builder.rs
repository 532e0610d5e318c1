//! Runtime builder for standalone mode.
//!
//! Provides a fluent API for configuring and building the standalone runtime.

use std::sync::Arc;

use tracing::info;

use crate::bus::{ChannelChatterSink, ChannelWorkQueue};
use crate::config::Config;
use crate::discovery::{AgentConfig, CatalogError, StaticAgentRegistry};
use crate::handlers::Coordinator;
use crate::interfaces::{AgentRegistry, ChatterSink, Planner, WorkQueue};
use crate::orchestration::{
    CompletionAggregator, Dispatcher, OrchestrationController, RetryingPlanner,
};
use crate::services::{DeadlineConfig, DeadlineScheduler};
use crate::storage::{init_storage, StorageConfig, StorageType};
use crate::utils::retry::RetryPolicy;

use super::echo::{EchoPlanner, EchoWorker};
use super::runtime::Runtime;

/// Builder for creating a standalone runtime.
///
/// Defaults:
/// - Storage: in-memory
/// - Planner: `EchoPlanner`
/// - No agents, no workers, no deadlines
pub struct RuntimeBuilder {
    storage: StorageConfig,
    agents: Vec<AgentConfig>,
    planner: Option<Arc<dyn Planner>>,
    planner_retry: RetryPolicy,
    dispatch_retry: RetryPolicy,
    deadlines: DeadlineConfig,
    echo_workers: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            storage: StorageConfig::default(),
            agents: Vec::new(),
            planner: None,
            planner_retry: RetryPolicy::default(),
            dispatch_retry: RetryPolicy::default(),
            deadlines: DeadlineConfig::default(),
            echo_workers: false,
        }
    }

    /// Seed the builder from application configuration.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        Ok(Self {
            storage: config.storage.clone(),
            agents: config.agent_configs()?,
            planner: None,
            planner_retry: config.planner.clone(),
            dispatch_retry: config.dispatch.clone(),
            deadlines: config.deadlines.clone(),
            echo_workers: false,
        })
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Use SQLite file storage.
    pub fn with_sqlite_file(mut self, path: impl Into<String>) -> Self {
        self.storage.storage_type = StorageType::Sqlite;
        self.storage.sqlite.path = path.into();
        self
    }

    pub fn register_agent(mut self, agent: AgentConfig) -> Self {
        self.agents.push(agent);
        self
    }

    /// Use a custom planner. It is wrapped with the planner retry policy.
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_planner_retry(mut self, policy: RetryPolicy) -> Self {
        self.planner_retry = policy;
        self
    }

    pub fn with_dispatch_retry(mut self, policy: RetryPolicy) -> Self {
        self.dispatch_retry = policy;
        self
    }

    pub fn with_deadlines(mut self, deadlines: DeadlineConfig) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Attach an `EchoWorker` to the queue of every active agent.
    pub fn with_echo_workers(mut self) -> Self {
        self.echo_workers = true;
        self
    }

    /// Build the runtime.
    pub async fn build(self) -> Result<Runtime, Box<dyn std::error::Error>> {
        let (sessions, ledger) = init_storage(&self.storage).await?;

        let registry = StaticAgentRegistry::from_configs(self.agents.iter().cloned());
        let registry: Arc<dyn AgentRegistry> = Arc::new(registry);
        let queue = ChannelWorkQueue::new();
        let chatter = ChannelChatterSink::new();
        let chatter_sink: Arc<dyn ChatterSink> = Arc::new(chatter.clone());

        let planner = self
            .planner
            .unwrap_or_else(|| Arc::new(EchoPlanner) as Arc<dyn Planner>);
        let planner: Arc<dyn Planner> = Arc::new(
            RetryingPlanner::new(planner).with_backoff(self.planner_retry.backoff()),
        );

        let dispatcher = Dispatcher::new(
            registry.clone(),
            Arc::new(queue.clone()),
            chatter_sink.clone(),
        )
        .with_backoff(self.dispatch_retry.backoff());

        let controller = OrchestrationController::new(
            sessions.clone(),
            ledger.clone(),
            planner,
            registry,
            dispatcher,
            chatter_sink,
        );
        let aggregator = CompletionAggregator::new(sessions.clone(), ledger.clone());
        let coordinator = Arc::new(Coordinator::new(controller, aggregator));

        if self.echo_workers {
            for agent in self.agents.iter().filter(|agent| agent.is_active()) {
                queue
                    .subscribe(
                        &agent.target,
                        Box::new(EchoWorker::new(&agent.name, coordinator.clone())),
                    )
                    .await?;
            }
        }

        let deadlines =
            DeadlineScheduler::from_config(&self.deadlines, ledger.clone(), coordinator.clone());

        info!(
            agents = self.agents.len(),
            echo_workers = self.echo_workers,
            deadlines = deadlines.is_some(),
            "Standalone runtime built"
        );

        Ok(Runtime::new(
            coordinator,
            sessions,
            ledger,
            queue,
            chatter,
            deadlines,
        ))
    }
}
