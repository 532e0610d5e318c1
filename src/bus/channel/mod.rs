//! In-memory channel-based work queue for standalone mode.
//!
//! Uses a tokio broadcast channel shared by every named queue. Each
//! subscriber filters on its queue name, so a message reaches only the
//! workers listening on its target.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use crate::interfaces::work_queue::{MessageHandler, QueueError, Result, WorkQueue};
use crate::interfaces::DeliveryTarget;
use crate::model::DispatchMessage;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// A message tagged with its destination queue.
#[derive(Debug, Clone)]
struct Envelope {
    queue: String,
    message: DispatchMessage,
}

/// In-memory work queue using tokio broadcast channels.
///
/// Sending to a queue nobody consumes fails, so the caller can record an
/// error completion instead of waiting on a message that will never be read.
#[derive(Clone)]
pub struct ChannelWorkQueue {
    sender: broadcast::Sender<Arc<Envelope>>,
    /// Consumer count per queue name.
    consumers: Arc<RwLock<HashMap<String, usize>>>,
}

impl Default for ChannelWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelWorkQueue {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        info!("Channel work queue initialized");
        Self {
            sender,
            consumers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of consumers listening on `queue`.
    pub async fn consumer_count(&self, queue: &str) -> usize {
        self.consumers.read().await.get(queue).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WorkQueue for ChannelWorkQueue {
    #[tracing::instrument(name = "queue.send", skip_all, fields(target = %target, node = %message.node_name))]
    async fn send(&self, target: &DeliveryTarget, message: DispatchMessage) -> Result<()> {
        let DeliveryTarget::Queue { name } = target;

        if self.consumer_count(name).await == 0 {
            return Err(QueueError::Send {
                target: target.to_string(),
                message: "no consumers".to_string(),
            });
        }

        let envelope = Arc::new(Envelope {
            queue: name.clone(),
            message,
        });
        self.sender
            .send(envelope)
            .map_err(|_| QueueError::Closed(target.to_string()))?;

        debug!("Message queued");
        Ok(())
    }

    async fn subscribe(
        &self,
        target: &DeliveryTarget,
        handler: Box<dyn MessageHandler>,
    ) -> Result<()> {
        let DeliveryTarget::Queue { name } = target;
        let queue = name.clone();

        let mut receiver = self.sender.subscribe();
        *self.consumers.write().await.entry(queue.clone()).or_default() += 1;

        let handler: Arc<dyn MessageHandler> = Arc::from(handler);
        let consumers = self.consumers.clone();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if envelope.queue != queue {
                            continue;
                        }

                        debug!(
                            queue = %queue,
                            node = %envelope.message.node_name,
                            "Received message via channel"
                        );

                        tokio::spawn(handler.handle(envelope.message.clone()));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        error!(queue = %queue, skipped = n, "Queue consumer lagged, skipped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(queue = %queue, "Channel closed, stopping consumer");
                        break;
                    }
                }
            }

            if let Some(count) = consumers.write().await.get_mut(&queue) {
                *count = count.saturating_sub(1);
            }
        });

        info!(queue = %name, "Queue consumer started");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
