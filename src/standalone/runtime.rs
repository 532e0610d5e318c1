//! Standalone runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::{ChannelChatterSink, ChannelWorkQueue, LogChatterSink};
use crate::handlers::{Coordinator, InboundEvent};
use crate::interfaces::{ChatterEvent, ChatterSink, CompletionLedger, SessionStore};
use crate::orchestration::{OrchestrationError, SessionOutcome};
use crate::services::DeadlineScheduler;

/// Errors from driving an objective to its answer.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Objective did not start a session")]
    NoSession,

    #[error("Chatter channel closed")]
    ChatterClosed,
}

/// Running single-process orchestration.
pub struct Runtime {
    coordinator: Arc<Coordinator>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn CompletionLedger>,
    queue: ChannelWorkQueue,
    chatter: ChannelChatterSink,
    deadlines: Option<Arc<DeadlineScheduler>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    pub(super) fn new(
        coordinator: Arc<Coordinator>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn CompletionLedger>,
        queue: ChannelWorkQueue,
        chatter: ChannelChatterSink,
        deadlines: Option<DeadlineScheduler>,
    ) -> Self {
        Self {
            coordinator,
            sessions,
            ledger,
            queue,
            chatter,
            deadlines: deadlines.map(Arc::new),
            tasks: Vec::new(),
        }
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    pub fn ledger(&self) -> Arc<dyn CompletionLedger> {
        self.ledger.clone()
    }

    /// The work queue, for attaching external workers.
    pub fn queue(&self) -> ChannelWorkQueue {
        self.queue.clone()
    }

    /// Receive chatter events published from now on.
    pub fn subscribe_chatter(&self) -> broadcast::Receiver<ChatterEvent> {
        self.chatter.subscribe()
    }

    /// Start background tasks: chatter logging and, if configured, the
    /// deadline scheduler. Calling this more than once has no effect.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        let mut events = self.chatter.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let sink = LogChatterSink;
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(e) = sink.publish(event).await {
                            warn!(error = %e, "Failed to log chatter");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Chatter logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        if let Some(scheduler) = &self.deadlines {
            let scheduler = scheduler.clone();
            self.tasks.push(tokio::spawn(async move { scheduler.run().await }));
        }

        info!("Runtime started");
    }

    /// Handle one inbound event.
    pub async fn submit(
        &self,
        event: InboundEvent,
    ) -> Result<Option<SessionOutcome>, OrchestrationError> {
        self.coordinator.handle(event).await
    }

    /// Start a session for `task` and wait for its answer.
    pub async fn run_objective(
        &self,
        task: &str,
        timeout: Duration,
    ) -> Result<String, RuntimeError> {
        // Subscribe first so a fast answer is not missed
        let mut events = self.chatter.subscribe();

        let outcome = self
            .coordinator
            .handle(InboundEvent::NewObjective {
                task: task.to_string(),
            })
            .await?;

        let session_id = match outcome {
            Some(SessionOutcome::Answered { text, .. }) => return Ok(text),
            Some(SessionOutcome::Awaiting { session_id, .. }) => session_id,
            None => return Err(RuntimeError::NoSession),
        };

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(ChatterEvent::DirectResponse {
                        session_id: answered,
                        message,
                        ..
                    }) if answered == session_id => return Ok(message),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Answer listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RuntimeError::ChatterClosed)
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| RuntimeError::Timeout(timeout))?
    }

    /// Run until Ctrl+C.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.start();
        info!("Runtime running, press Ctrl+C to exit");

        tokio::signal::ctrl_c().await?;

        info!("Shutting down runtime");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
