//! Backend-agnostic storage contract tests.
//!
//! Each backend test binary calls these with its own store instances.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use arbiter::interfaces::{CompletionLedger, SessionStore, StorageError};
use arbiter::model::{ContentBlock, Role, RoundId, SessionId, SubtaskInvocation, Turn};

fn nodes(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub async fn test_session_lifecycle(store: &dyn SessionStore) {
    let id = store.create(Turn::user_text("objective")).await.unwrap();
    let mut session = store.load(id).await.unwrap();
    assert_eq!(session.conversation.len(), 1);
    assert!(session.active_round_id.is_none());

    session.conversation.push(Turn {
        role: Role::Assistant,
        content: vec![ContentBlock::Invocation(SubtaskInvocation::new(
            "c1",
            "agentX",
            json!({"q": 1}),
        ))],
    });
    session.active_round_id = Some(RoundId::new());
    store.save(&session).await.unwrap();

    let loaded = store.load(id).await.unwrap();
    assert_eq!(loaded.conversation, session.conversation);
    assert_eq!(loaded.active_round_id, session.active_round_id);

    let missing = store.load(SessionId::new()).await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));
}

pub async fn test_ledger_scenario(ledger: &dyn CompletionLedger) {
    let round_id = ledger
        .open_round(SessionId::new(), &nodes(&["agentX_call1", "agentY_call1"]))
        .await
        .unwrap();

    let first = ledger
        .record_completion(round_id, "agentY_call1", json!("resultB"))
        .await
        .unwrap();
    assert!(!first.complete);
    assert!(first.results.is_none());

    let second = ledger
        .record_completion(round_id, "agentX_call1", json!("resultA"))
        .await
        .unwrap();
    assert!(second.complete);
    let results = second.results.unwrap();
    assert_eq!(results["agentX_call1"], json!("resultA"));
    assert_eq!(results["agentY_call1"], json!("resultB"));
}

pub async fn test_ledger_idempotence(ledger: &dyn CompletionLedger) {
    let round_id = ledger
        .open_round(SessionId::new(), &nodes(&["a", "b"]))
        .await
        .unwrap();

    let once = ledger.record_completion(round_id, "a", json!(1)).await.unwrap();
    let twice = ledger.record_completion(round_id, "a", json!(1)).await.unwrap();
    assert_eq!(once.complete, twice.complete);
    assert!(!twice.finished_round());

    let last = ledger.record_completion(round_id, "b", json!(2)).await.unwrap();
    assert!(last.finished_round());

    let replay = ledger.record_completion(round_id, "b", json!(2)).await.unwrap();
    assert!(replay.complete);
    assert!(!replay.finished_round());
}

pub async fn test_ledger_rejections(ledger: &dyn CompletionLedger) {
    let empty = ledger.open_round(SessionId::new(), &BTreeSet::new()).await;
    assert!(matches!(empty, Err(StorageError::EmptyRound)));

    let round_id = ledger
        .open_round(SessionId::new(), &nodes(&["a"]))
        .await
        .unwrap();
    let unknown_node = ledger.record_completion(round_id, "b", json!(null)).await;
    assert!(matches!(unknown_node, Err(StorageError::UnknownNode { .. })));

    let unknown_round = ledger
        .record_completion(RoundId::new(), "a", json!(null))
        .await;
    assert!(matches!(unknown_round, Err(StorageError::UnknownRound(_))));
}

pub async fn test_ledger_single_finisher(ledger: Arc<dyn CompletionLedger>, width: usize) {
    let names: Vec<String> = (0..width).map(|i| format!("node_{:03}", i)).collect();
    let round_id = ledger
        .open_round(SessionId::new(), &names.iter().cloned().collect())
        .await
        .unwrap();

    let handles: Vec<_> = names
        .into_iter()
        .map(|name| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .record_completion(round_id, &name, json!(name.clone()))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut finishers = 0;
    for handle in handles {
        if handle.await.unwrap().finished_round() {
            finishers += 1;
        }
    }
    assert_eq!(finishers, 1);

    let round = ledger.get_round(round_id).await.unwrap();
    assert!(round.is_complete());
    assert!(round.sealed);
    assert_eq!(round.nodes.len(), width);
}
