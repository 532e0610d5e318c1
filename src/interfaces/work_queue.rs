//! Work queue interface for sub-task delivery.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::registry::DeliveryTarget;
use crate::model::DispatchMessage;

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur during queue operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Send to {target} failed: {message}")]
    Send { target: String, message: String },

    #[error("Queue closed: {0}")]
    Closed(String),

    #[error("Subscribe not supported for this queue type")]
    SubscribeNotSupported,
}

impl QueueError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Connection(_) | QueueError::Send { .. })
    }
}

/// Handler for messages consumed from a work queue.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: DispatchMessage) -> BoxFuture<'static, ()>;
}

/// Delivery of dispatch messages to workers.
///
/// Implementations:
/// - `ChannelWorkQueue`: in-process broadcast channel with per-queue filtering
/// - `MockWorkQueue`: records sends for tests
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Deliver one message to the worker behind `target`.
    async fn send(&self, target: &DeliveryTarget, message: DispatchMessage) -> Result<()>;

    /// Consume messages addressed to `target` (worker side).
    async fn subscribe(
        &self,
        target: &DeliveryTarget,
        handler: Box<dyn MessageHandler>,
    ) -> Result<()>;
}
