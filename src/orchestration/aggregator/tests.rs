use std::collections::BTreeSet;

use serde_json::json;

use super::*;
use crate::model::Turn;
use crate::orchestration::OrchestrationError;
use crate::storage::{MemoryLedger, MemorySessionStore};

struct Fixture {
    aggregator: CompletionAggregator,
    sessions: Arc<MemorySessionStore>,
    ledger: Arc<MemoryLedger>,
}

fn fixture() -> Fixture {
    let sessions = Arc::new(MemorySessionStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    Fixture {
        aggregator: CompletionAggregator::new(sessions.clone(), ledger.clone()),
        sessions,
        ledger,
    }
}

async fn active_round(f: &Fixture, nodes: &[&str]) -> (SessionId, RoundId) {
    let session_id = f.sessions.create(Turn::user_text("objective")).await.unwrap();
    let names: BTreeSet<String> = nodes.iter().map(|n| n.to_string()).collect();
    let round_id = f.ledger.open_round(session_id, &names).await.unwrap();

    let mut session = f.sessions.load(session_id).await.unwrap();
    session.active_round_id = Some(round_id);
    f.sessions.save(&session).await.unwrap();
    (session_id, round_id)
}

fn notification(
    session_id: SessionId,
    round_id: RoundId,
    node: &str,
    result: Value,
) -> CompletionNotification {
    CompletionNotification {
        session_id,
        round_id,
        node_name: node.to_string(),
        result,
    }
}

#[tokio::test]
async fn test_last_completion_returns_results() {
    let f = fixture();
    let (s, r) = active_round(&f, &["agentX_call1", "agentY_call1"]).await;

    let first = f
        .aggregator
        .handle(notification(s, r, "agentY_call1", json!("resultB")))
        .await
        .unwrap();
    assert!(first.is_none());

    let second = f
        .aggregator
        .handle(notification(s, r, "agentX_call1", json!("resultA")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.session_id, s);
    assert_eq!(second.round_id, r);
    let keys: Vec<&String> = second.results.keys().collect();
    assert_eq!(keys, vec!["agentX_call1", "agentY_call1"]);
}

#[tokio::test]
async fn test_duplicate_completion_does_not_finish_twice() {
    let f = fixture();
    let (s, r) = active_round(&f, &["a"]).await;

    let first = f
        .aggregator
        .handle(notification(s, r, "a", json!(1)))
        .await
        .unwrap();
    assert!(first.is_some());

    let again = f
        .aggregator
        .handle(notification(s, r, "a", json!(1)))
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn test_stale_round_rejected_without_touching_ledger() {
    let f = fixture();
    let (s, current) = active_round(&f, &["a"]).await;
    let old = f
        .ledger
        .open_round(s, &["a".to_string()].into_iter().collect())
        .await
        .unwrap();

    let err = f
        .aggregator
        .handle(notification(s, old, "a", json!("late")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::Storage(StorageError::UnknownRound(id)) if id == old
    ));
    assert!(err.is_stale_reference());

    let old_round = f.ledger.get_round(old).await.unwrap();
    assert!(!old_round.nodes["a"].completed);
    let current_round = f.ledger.get_round(current).await.unwrap();
    assert!(!current_round.nodes["a"].completed);
}

#[tokio::test]
async fn test_unknown_session_and_node() {
    let f = fixture();
    let (s, r) = active_round(&f, &["a"]).await;

    let err = f
        .aggregator
        .handle(notification(SessionId::new(), r, "a", json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::Storage(StorageError::NotFound(_))
    ));

    let err = f
        .aggregator
        .handle(notification(s, r, "zzz", json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::Storage(StorageError::UnknownNode { .. })
    ));
}
