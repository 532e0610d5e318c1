use std::time::Duration;

use serde_json::json;

use super::*;
use crate::bus::{MockChatterSink, MockWorkQueue};
use crate::discovery::{AgentConfig, StaticAgentRegistry};
use crate::interfaces::DeliveryTarget;

struct Fixture {
    dispatcher: Dispatcher,
    queue: Arc<MockWorkQueue>,
    chatter: Arc<MockChatterSink>,
}

fn fixture() -> Fixture {
    let registry = Arc::new(StaticAgentRegistry::from_configs([AgentConfig::active(
        "agentX", "Test agent", "x-tasks",
    )]));
    let queue = Arc::new(MockWorkQueue::new());
    let chatter = Arc::new(MockChatterSink::new());
    let dispatcher = Dispatcher::new(registry, queue.clone(), chatter.clone()).with_backoff(
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_max_times(2),
    );
    Fixture {
        dispatcher,
        queue,
        chatter,
    }
}

#[tokio::test]
async fn test_dispatch_sends_message_and_chatter() {
    let f = fixture();
    let session_id = SessionId::new();
    let round_id = RoundId::new();

    f.dispatcher
        .dispatch(session_id, round_id, "agentX_call1", "agentX", json!({"q": "a"}))
        .await
        .unwrap();

    let sent = f.queue.take_sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, DeliveryTarget::queue("x-tasks"));
    assert_eq!(
        sent[0].1,
        DispatchMessage {
            session_id,
            round_id,
            node_name: "agentX_call1".to_string(),
            input: json!({"q": "a"}),
        }
    );

    let calls = f.chatter.events_of("agent_call").await;
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        ChatterEvent::AgentCall { node, target, .. } => {
            assert_eq!(node, "agentX_call1");
            assert_eq!(target, "queue:x-tasks");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_agent_is_not_sent() {
    let f = fixture();
    let result = f
        .dispatcher
        .dispatch(SessionId::new(), RoundId::new(), "ghost_1", "ghost", json!({}))
        .await;

    assert!(matches!(
        result,
        Err(DispatchError::Registry(RegistryError::UnknownAgent(_)))
    ));
    assert_eq!(f.queue.attempts().await, 0);
    assert!(f.chatter.events().await.is_empty());
}

#[tokio::test]
async fn test_transient_send_failure_is_retried() {
    let f = fixture();
    f.queue.fail_next(2).await;

    f.dispatcher
        .dispatch(SessionId::new(), RoundId::new(), "agentX_1", "agentX", json!({}))
        .await
        .unwrap();

    assert_eq!(f.queue.attempts().await, 3);
    assert_eq!(f.queue.sent_count().await, 1);
}

#[tokio::test]
async fn test_persistent_send_failure_gives_up() {
    let f = fixture();
    f.queue.set_fail_on_send(true).await;

    let result = f
        .dispatcher
        .dispatch(SessionId::new(), RoundId::new(), "agentX_1", "agentX", json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::Queue(_))));
    assert_eq!(f.queue.attempts().await, 3);
    assert!(f.chatter.events().await.is_empty());
}

#[tokio::test]
async fn test_chatter_failure_does_not_fail_dispatch() {
    let f = fixture();
    f.chatter.set_fail_on_publish(true).await;

    let result = f
        .dispatcher
        .dispatch(SessionId::new(), RoundId::new(), "agentX_1", "agentX", json!({}))
        .await;

    assert!(result.is_ok());
    assert_eq!(f.queue.sent_count().await, 1);
}
