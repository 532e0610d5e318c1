//! Chatter sinks.
//!
//! Chatter is best-effort: callers log publish failures and carry on.

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::interfaces::{ChatterError, ChatterEvent, ChatterSink};

/// Writes chatter events to the tracing log as JSON.
#[derive(Debug, Default, Clone)]
pub struct LogChatterSink;

#[async_trait]
impl ChatterSink for LogChatterSink {
    async fn publish(&self, event: ChatterEvent) -> Result<(), ChatterError> {
        let payload =
            serde_json::to_string(&event).map_err(|e| ChatterError::Publish(e.to_string()))?;
        info!(
            session_id = %event.session_id(),
            action = event.kind(),
            event = %payload,
            "chatter"
        );
        Ok(())
    }
}

/// Broadcasts chatter events to in-process listeners.
#[derive(Clone)]
pub struct ChannelChatterSink {
    sender: broadcast::Sender<ChatterEvent>,
}

impl Default for ChannelChatterSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelChatterSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatterEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl ChatterSink for ChannelChatterSink {
    async fn publish(&self, event: ChatterEvent) -> Result<(), ChatterError> {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "Chatter broadcast"),
            // No listeners is fine
            Err(_) => debug!("Chatter dropped, no listeners"),
        }
        Ok(())
    }
}

/// Mock chatter sink for testing.
#[derive(Default)]
pub struct MockChatterSink {
    events: RwLock<Vec<ChatterEvent>>,
    fail_on_publish: RwLock<bool>,
}

impl MockChatterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn events(&self) -> Vec<ChatterEvent> {
        self.events.read().await.clone()
    }

    /// Events of one kind (`agent_call` or `direct_response`).
    pub async fn events_of(&self, kind: &str) -> Vec<ChatterEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatterSink for MockChatterSink {
    async fn publish(&self, event: ChatterEvent) -> Result<(), ChatterError> {
        if *self.fail_on_publish.read().await {
            return Err(ChatterError::Publish("Mock publish failure".to_string()));
        }
        self.events.write().await.push(event);
        Ok(())
    }
}
