use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tokio::sync::mpsc;

use super::*;
use crate::model::{RoundId, SessionId};

struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl MessageHandler for CountingHandler {
    fn handle(&self, _message: DispatchMessage) -> BoxFuture<'static, ()> {
        let count = self.count.clone();
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }
}

struct ForwardingHandler {
    tx: mpsc::UnboundedSender<DispatchMessage>,
}

impl MessageHandler for ForwardingHandler {
    fn handle(&self, message: DispatchMessage) -> BoxFuture<'static, ()> {
        let _ = self.tx.send(message);
        Box::pin(async {})
    }
}

fn message(node: &str) -> DispatchMessage {
    DispatchMessage {
        session_id: SessionId::new(),
        round_id: RoundId::new(),
        node_name: node.to_string(),
        input: json!({"q": node}),
    }
}

#[tokio::test]
async fn test_send_without_consumers_fails() {
    let queue = ChannelWorkQueue::new();
    let result = queue
        .send(&DeliveryTarget::queue("nobody"), message("a_1"))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, QueueError::Send { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_subscribe_and_receive() {
    let queue = ChannelWorkQueue::new();
    let target = DeliveryTarget::queue("research");
    let (tx, mut rx) = mpsc::unbounded_channel();

    queue
        .subscribe(&target, Box::new(ForwardingHandler { tx }))
        .await
        .unwrap();
    assert_eq!(queue.consumer_count("research").await, 1);

    let sent = message("researcher_1");
    queue.send(&target, sent.clone()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, sent);
}

#[tokio::test]
async fn test_queue_name_filter() {
    let queue = ChannelWorkQueue::new();
    let research = Arc::new(AtomicUsize::new(0));
    let writing = Arc::new(AtomicUsize::new(0));

    queue
        .subscribe(
            &DeliveryTarget::queue("research"),
            Box::new(CountingHandler {
                count: research.clone(),
            }),
        )
        .await
        .unwrap();
    queue
        .subscribe(
            &DeliveryTarget::queue("writing"),
            Box::new(CountingHandler {
                count: writing.clone(),
            }),
        )
        .await
        .unwrap();

    queue
        .send(&DeliveryTarget::queue("research"), message("r_1"))
        .await
        .unwrap();
    queue
        .send(&DeliveryTarget::queue("research"), message("r_2"))
        .await
        .unwrap();
    queue
        .send(&DeliveryTarget::queue("writing"), message("w_1"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(research.load(Ordering::SeqCst), 2);
    assert_eq!(writing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clones_share_channel() {
    let worker_side = ChannelWorkQueue::new();
    let dispatcher_side = worker_side.clone();
    let count = Arc::new(AtomicUsize::new(0));

    worker_side
        .subscribe(
            &DeliveryTarget::queue("tasks"),
            Box::new(CountingHandler {
                count: count.clone(),
            }),
        )
        .await
        .unwrap();

    dispatcher_side
        .send(&DeliveryTarget::queue("tasks"), message("t_1"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
