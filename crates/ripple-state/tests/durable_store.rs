//! Durability tests for the embedded `surrealkv://` backend.
//!
//! Each test opens a store in a temp directory, writes, drops every handle
//! and reopens the same directory.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use ripple_state::storage_traits::*;
use ripple_state::{StoreConfig, SurrealHandle, SurrealReceiptLedger, SurrealRelationshipStore};

#[tokio::test]
async fn relationships_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::local(dir.path().join("db"));

    {
        let handle = SurrealHandle::connect(&config).await.unwrap();
        let store = SurrealRelationshipStore::new(handle);
        store
            .add(
                &RepoId::from("org/service-a"),
                &RepoId::from("org/service-b"),
                RelationshipKind::DependsOn,
                BTreeMap::from([("note".to_string(), "grpc client".to_string())]),
            )
            .await
            .unwrap();
    }
    // Let the embedded engine's router task shut down and release the files.
    tokio::time::sleep(Duration::from_millis(250)).await;

    let handle = SurrealHandle::connect(&config).await.unwrap();
    let store = SurrealRelationshipStore::new(handle);
    let out = store.outgoing(&RepoId::from("org/service-a")).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].target, RepoId::from("org/service-b"));
    assert_eq!(out[0].metadata.get("note").map(String::as_str), Some("grpc client"));

    // Uniqueness still holds after reopening.
    let err = store
        .add(
            &RepoId::from("org/service-a"),
            &RepoId::from("org/service-b"),
            RelationshipKind::DependsOn,
            BTreeMap::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ripple_state::StorageError::Conflict { .. }));
}

#[tokio::test]
async fn receipts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::local(dir.path().join("db"));

    {
        let handle = SurrealHandle::connect(&config).await.unwrap();
        let ledger = SurrealReceiptLedger::new(handle);
        ledger
            .record(PublicationReceipt {
                delivery_id: "delivery-42".to_string(),
                repo: RepoId::from("org/service-a"),
                pr_id: 42,
                comment_id: 9001,
                comment_url: None,
                published_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    // Let the embedded engine's router task shut down and release the files.
    tokio::time::sleep(Duration::from_millis(250)).await;

    let handle = SurrealHandle::connect(&config).await.unwrap();
    let ledger = SurrealReceiptLedger::new(handle);
    let got = ledger.get("delivery-42").await.unwrap().unwrap();
    assert_eq!(got.comment_id, 9001);
    assert_eq!(got.pr_id, 42);
}
