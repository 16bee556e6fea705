//! In-memory fakes for storage traits
//!
//! Provides `MemoryRelationshipStore` and `MemoryReceiptLedger` that satisfy
//! the trait contracts without any external dependencies. They back the
//! test suites and the CLI's `--store mem://` mode.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRelationshipStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Graph {
    edges: BTreeMap<RelationshipKey, Relationship>,
    by_source: HashMap<RepoId, BTreeSet<RelationshipKey>>,
    by_target: HashMap<RepoId, BTreeSet<RelationshipKey>>,
}

impl Graph {
    fn collect(&self, keys: Option<&BTreeSet<RelationshipKey>>) -> Vec<Relationship> {
        keys.map(|keys| {
            keys.iter()
                .filter_map(|k| self.edges.get(k).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}

/// Drop `key` from `repo`'s index entry, and the entry once it is empty.
fn unindex(
    index: &mut HashMap<RepoId, BTreeSet<RelationshipKey>>,
    repo: &RepoId,
    key: &RelationshipKey,
) {
    if let Some(keys) = index.get_mut(repo) {
        keys.remove(key);
        if keys.is_empty() {
            index.remove(repo);
        }
    }
}

/// In-memory relationship store with `source` and `target` indexes.
///
/// Readers share an `RwLock`; each write holds the write lock for its whole
/// check-and-insert, so concurrent writers are serialized.
#[derive(Debug, Default)]
pub struct MemoryRelationshipStore {
    graph: RwLock<Graph>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn add(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
        metadata: BTreeMap<String, String>,
    ) -> StorageResult<Relationship> {
        let key = RelationshipKey::new(source, target, kind);
        key.validate()?;

        let mut graph = self.graph.write().unwrap();
        if graph.edges.contains_key(&key) {
            return Err(key.conflict());
        }
        let relationship = Relationship {
            source: source.clone(),
            target: target.clone(),
            kind,
            metadata,
            created_at: Utc::now(),
        };
        graph
            .by_source
            .entry(source.clone())
            .or_default()
            .insert(key.clone());
        graph
            .by_target
            .entry(target.clone())
            .or_default()
            .insert(key.clone());
        graph.edges.insert(key, relationship.clone());
        Ok(relationship)
    }

    async fn remove(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
    ) -> StorageResult<bool> {
        let key = RelationshipKey::new(source, target, kind);
        let mut graph = self.graph.write().unwrap();
        if graph.edges.remove(&key).is_none() {
            return Ok(false);
        }
        unindex(&mut graph.by_source, source, &key);
        unindex(&mut graph.by_target, target, &key);
        Ok(true)
    }

    async fn outgoing(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
        let graph = self.graph.read().unwrap();
        Ok(graph.collect(graph.by_source.get(repo)))
    }

    async fn incoming(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
        let graph = self.graph.read().unwrap();
        Ok(graph.collect(graph.by_target.get(repo)))
    }

    async fn list(&self) -> StorageResult<Vec<Relationship>> {
        let graph = self.graph.read().unwrap();
        Ok(graph.edges.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryReceiptLedger
// ---------------------------------------------------------------------------

/// In-memory receipt ledger backed by a `HashMap<delivery_id, receipt>`.
#[derive(Debug, Default)]
pub struct MemoryReceiptLedger {
    receipts: Mutex<HashMap<String, PublicationReceipt>>,
}

impl MemoryReceiptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored receipts.
    pub fn len(&self) -> usize {
        self.receipts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReceiptLedger for MemoryReceiptLedger {
    async fn get(&self, delivery_id: &str) -> StorageResult<Option<PublicationReceipt>> {
        let receipts = self.receipts.lock().unwrap();
        Ok(receipts.get(delivery_id).cloned())
    }

    async fn record(&self, receipt: PublicationReceipt) -> StorageResult<PublicationReceipt> {
        let mut receipts = self.receipts.lock().unwrap();
        let stored = receipts
            .entry(receipt.delivery_id.clone())
            .or_insert(receipt);
        Ok(stored.clone())
    }
}
