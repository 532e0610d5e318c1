//! Mock work queue implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::work_queue::{MessageHandler, QueueError, Result, WorkQueue};
use crate::interfaces::DeliveryTarget;
use crate::model::DispatchMessage;

/// Mock work queue for testing.
///
/// Records every successful send. Failures can be forced permanently or for
/// a fixed number of upcoming sends, to exercise retry paths.
#[derive(Default)]
pub struct MockWorkQueue {
    sent: RwLock<Vec<(DeliveryTarget, DispatchMessage)>>,
    fail_on_send: RwLock<bool>,
    failures_remaining: RwLock<usize>,
    attempts: RwLock<usize>,
}

impl MockWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_send(&self, fail: bool) {
        *self.fail_on_send.write().await = fail;
    }

    /// Fail the next `count` sends, then succeed.
    pub async fn fail_next(&self, count: usize) {
        *self.failures_remaining.write().await = count;
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    /// Send attempts, including failed ones.
    pub async fn attempts(&self) -> usize {
        *self.attempts.read().await
    }

    pub async fn take_sent(&self) -> Vec<(DeliveryTarget, DispatchMessage)> {
        std::mem::take(&mut *self.sent.write().await)
    }
}

#[async_trait]
impl WorkQueue for MockWorkQueue {
    async fn send(&self, target: &DeliveryTarget, message: DispatchMessage) -> Result<()> {
        *self.attempts.write().await += 1;

        if *self.fail_on_send.read().await {
            return Err(QueueError::Connection("Mock send failure".to_string()));
        }

        {
            let mut remaining = self.failures_remaining.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(QueueError::Send {
                    target: target.to_string(),
                    message: "Mock transient failure".to_string(),
                });
            }
        }

        self.sent.write().await.push((target.clone(), message));
        Ok(())
    }

    async fn subscribe(
        &self,
        _target: &DeliveryTarget,
        _handler: Box<dyn MessageHandler>,
    ) -> Result<()> {
        Err(QueueError::SubscribeNotSupported)
    }
}
