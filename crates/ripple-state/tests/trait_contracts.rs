//! Trait contract tests for RelationshipStore and ReceiptLedger.
//!
//! Every contract runs against the in-memory fakes and the SurrealDB
//! implementation on `mem://`. Any conforming implementation must pass these.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use ripple_state::fakes::{MemoryReceiptLedger, MemoryRelationshipStore};
use ripple_state::storage_traits::*;
use ripple_state::{StorageError, SurrealHandle, SurrealReceiptLedger, SurrealRelationshipStore};

async fn stores() -> Vec<(&'static str, Arc<dyn RelationshipStore>)> {
    let handle = SurrealHandle::in_memory().await.unwrap();
    vec![
        ("memory", Arc::new(MemoryRelationshipStore::new())),
        ("surreal", Arc::new(SurrealRelationshipStore::new(handle))),
    ]
}

async fn ledgers() -> Vec<(&'static str, Arc<dyn ReceiptLedger>)> {
    let handle = SurrealHandle::in_memory().await.unwrap();
    vec![
        ("memory", Arc::new(MemoryReceiptLedger::new())),
        ("surreal", Arc::new(SurrealReceiptLedger::new(handle))),
    ]
}

fn repo(s: &str) -> RepoId {
    RepoId::from(s)
}

// ===========================================================================
// RelationshipStore contract tests
// ===========================================================================

#[tokio::test]
async fn add_then_outgoing_contains_relationship() {
    for (name, store) in stores().await {
        let meta = BTreeMap::from([("owner".to_string(), "platform".to_string())]);
        let added = store
            .add(&repo("org/a"), &repo("org/b"), RelationshipKind::DependsOn, meta.clone())
            .await
            .unwrap();
        assert_eq!(added.metadata, meta, "{name}");

        let out = store.outgoing(&repo("org/a")).await.unwrap();
        assert_eq!(out.len(), 1, "{name}");
        assert_eq!(out[0].target, repo("org/b"), "{name}");
        assert_eq!(out[0].kind, RelationshipKind::DependsOn, "{name}");
        assert_eq!(out[0].metadata, meta, "{name}");
    }
}

#[tokio::test]
async fn remove_then_outgoing_is_empty() {
    for (name, store) in stores().await {
        store
            .add(&repo("org/a"), &repo("org/b"), RelationshipKind::DependsOn, BTreeMap::new())
            .await
            .unwrap();

        let removed = store
            .remove(&repo("org/a"), &repo("org/b"), RelationshipKind::DependsOn)
            .await
            .unwrap();
        assert!(removed, "{name}");
        assert!(store.outgoing(&repo("org/a")).await.unwrap().is_empty(), "{name}");
        assert!(store.incoming(&repo("org/b")).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn remove_missing_returns_false() {
    for (name, store) in stores().await {
        let removed = store
            .remove(&repo("org/a"), &repo("org/b"), RelationshipKind::SameDomain)
            .await
            .unwrap();
        assert!(!removed, "{name}");
    }
}

#[tokio::test]
async fn duplicate_triple_is_conflict() {
    for (name, store) in stores().await {
        store
            .add(&repo("org/a"), &repo("org/b"), RelationshipKind::SharedLibrary, BTreeMap::new())
            .await
            .unwrap();
        let err = store
            .add(&repo("org/a"), &repo("org/b"), RelationshipKind::SharedLibrary, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }), "{name}: {err:?}");
        assert!(!err.is_retryable(), "{name}");
    }
}

#[tokio::test]
async fn same_pair_different_kinds_coexist() {
    for (name, store) in stores().await {
        for kind in [RelationshipKind::DependsOn, RelationshipKind::SameDomain] {
            store
                .add(&repo("org/a"), &repo("org/b"), kind, BTreeMap::new())
                .await
                .unwrap();
        }
        assert_eq!(store.outgoing(&repo("org/a")).await.unwrap().len(), 2, "{name}");
    }
}

#[tokio::test]
async fn kinds_on_one_pair_are_ordered_by_name() {
    for (name, store) in stores().await {
        for kind in [
            RelationshipKind::SharedLibrary,
            RelationshipKind::DependsOn,
            RelationshipKind::ConsumerOfApi,
        ] {
            store
                .add(&repo("org/a"), &repo("org/b"), kind, BTreeMap::new())
                .await
                .unwrap();
        }

        let expected = vec![
            RelationshipKind::ConsumerOfApi,
            RelationshipKind::DependsOn,
            RelationshipKind::SharedLibrary,
        ];
        let kinds = |rels: Vec<Relationship>| rels.iter().map(|r| r.kind).collect::<Vec<_>>();
        assert_eq!(kinds(store.outgoing(&repo("org/a")).await.unwrap()), expected, "{name}");
        assert_eq!(kinds(store.incoming(&repo("org/b")).await.unwrap()), expected, "{name}");
        assert_eq!(kinds(store.list().await.unwrap()), expected, "{name}");
    }
}

#[tokio::test]
async fn self_edge_is_rejected() {
    for (name, store) in stores().await {
        let err = store
            .add(&repo("org/a"), &repo("org/a"), RelationshipKind::DependsOn, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRelationship { .. }), "{name}");
        assert!(store.list().await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn incoming_and_list_are_ordered() {
    for (name, store) in stores().await {
        for (src, kind) in [
            ("org/c", RelationshipKind::DependsOn),
            ("org/a", RelationshipKind::SameDomain),
            ("org/a", RelationshipKind::DependsOn),
        ] {
            store
                .add(&repo(src), &repo("org/hub"), kind, BTreeMap::new())
                .await
                .unwrap();
        }

        let incoming = store.incoming(&repo("org/hub")).await.unwrap();
        let keys: Vec<(String, RelationshipKind)> = incoming
            .iter()
            .map(|r| (r.source.to_string(), r.kind))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("org/a".to_string(), RelationshipKind::DependsOn),
                ("org/a".to_string(), RelationshipKind::SameDomain),
                ("org/c".to_string(), RelationshipKind::DependsOn),
            ],
            "{name}"
        );
        assert_eq!(store.list().await.unwrap().len(), 3, "{name}");
    }
}

#[tokio::test]
async fn concurrent_duplicate_adds_store_exactly_one() {
    for (name, store) in stores().await {
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .add(
                        &RepoId::from("org/a"),
                        &RepoId::from("org/b"),
                        RelationshipKind::ConsumerOfApi,
                        BTreeMap::new(),
                    )
                    .await
            }));
        }

        let mut ok = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StorageError::Conflict { .. }) => {}
                Err(other) => panic!("{name}: unexpected error {other:?}"),
            }
        }
        assert_eq!(ok, 1, "{name}");
        assert_eq!(store.list().await.unwrap().len(), 1, "{name}");
    }
}

// ===========================================================================
// ReceiptLedger contract tests
// ===========================================================================

fn receipt(delivery: &str, comment_id: u64) -> PublicationReceipt {
    PublicationReceipt {
        delivery_id: delivery.to_string(),
        repo: RepoId::from("org/a"),
        pr_id: 7,
        comment_id,
        comment_url: Some(format!("https://github.com/org/a/pull/7#issuecomment-{comment_id}")),
        published_at: Utc::now(),
    }
}

#[tokio::test]
async fn ledger_get_missing_is_none() {
    for (name, ledger) in ledgers().await {
        assert!(ledger.get("nope").await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn ledger_record_then_get() {
    for (name, ledger) in ledgers().await {
        let stored = ledger.record(receipt("d-1", 100)).await.unwrap();
        let fetched = ledger.get("d-1").await.unwrap().unwrap();
        assert_eq!(stored.comment_id, 100, "{name}");
        assert_eq!(fetched.comment_id, 100, "{name}");
        assert_eq!(fetched.pr_id, 7, "{name}");
        assert_eq!(fetched.comment_url, stored.comment_url, "{name}");
    }
}

#[tokio::test]
async fn ledger_first_write_wins() {
    for (name, ledger) in ledgers().await {
        ledger.record(receipt("d-1", 100)).await.unwrap();
        let second = ledger.record(receipt("d-1", 200)).await.unwrap();
        assert_eq!(second.comment_id, 100, "{name}");
        assert_eq!(ledger.get("d-1").await.unwrap().unwrap().comment_id, 100, "{name}");
    }
}
