//! SurrealDB-backed RelationshipStore and ReceiptLedger
//!
//! Uses `schema::RelationshipRow` and `schema::ReceiptRow` for persistence,
//! converting to/from `storage_traits` types at the boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::locks::KeyedLocks;
use crate::schema::{ReceiptRow, RelationshipRow, RECEIPTS, RELATIONSHIPS};
use crate::storage_traits::{
    PublicationReceipt, ReceiptLedger, Relationship, RelationshipKey, RelationshipKind,
    RelationshipStore, RepoId, StorageResult,
};

fn is_duplicate(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("already exists") || msg.contains("already contains")
}

/// SurrealDB-backed implementation of [`RelationshipStore`].
#[derive(Clone)]
pub struct SurrealRelationshipStore {
    handle: SurrealHandle,
    writers: Arc<KeyedLocks>,
}

impl SurrealRelationshipStore {
    pub fn new(handle: SurrealHandle) -> Self {
        Self {
            handle,
            writers: Arc::new(KeyedLocks::new()),
        }
    }

    async fn query_rows(
        &self,
        sql: &'static str,
        repo: Option<&RepoId>,
    ) -> StorageResult<Vec<Relationship>> {
        let mut query = self.handle.db().query(sql);
        if let Some(repo) = repo {
            query = query.bind(("repo", repo.to_string()));
        }
        let mut res = query.await?;
        let rows: Vec<RelationshipRow> = res.take(0)?;
        rows.into_iter()
            .map(RelationshipRow::into_relationship)
            .collect()
    }
}

#[async_trait]
impl RelationshipStore for SurrealRelationshipStore {
    #[instrument(skip(self, metadata), fields(source = %source, target = %target, kind = %kind))]
    async fn add(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
        metadata: BTreeMap<String, String>,
    ) -> StorageResult<Relationship> {
        let key = RelationshipKey::new(source, target, kind);
        key.validate()?;
        let id = key.digest();
        let _guard = self.writers.lock(&id).await;

        let existing: Option<RelationshipRow> =
            self.handle.db().select((RELATIONSHIPS, id.clone())).await?;
        if existing.is_some() {
            return Err(key.conflict());
        }

        let relationship = Relationship {
            source: source.clone(),
            target: target.clone(),
            kind,
            metadata,
            created_at: Utc::now(),
        };
        let row = RelationshipRow::from_relationship(&relationship);

        let created: Option<RelationshipRow> = self
            .handle
            .db()
            .create((RELATIONSHIPS, id))
            .content(row)
            .await
            .map_err(|e| {
                if is_duplicate(&e) {
                    key.conflict()
                } else {
                    StorageError::Backend(e.to_string())
                }
            })?;

        let stored = created.ok_or_else(|| {
            StorageError::Backend("create returned no relationship row".to_string())
        })?;
        debug!("relationship stored");
        stored.into_relationship()
    }

    #[instrument(skip(self), fields(source = %source, target = %target, kind = %kind))]
    async fn remove(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
    ) -> StorageResult<bool> {
        let id = RelationshipKey::new(source, target, kind).digest();
        let _guard = self.writers.lock(&id).await;

        let removed: Option<RelationshipRow> =
            self.handle.db().delete((RELATIONSHIPS, id)).await?;
        Ok(removed.is_some())
    }

    async fn outgoing(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
        self.query_rows(
            "SELECT * FROM relationships WHERE source = $repo ORDER BY source, target, kind",
            Some(repo),
        )
        .await
    }

    async fn incoming(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
        self.query_rows(
            "SELECT * FROM relationships WHERE target = $repo ORDER BY source, target, kind",
            Some(repo),
        )
        .await
    }

    async fn list(&self) -> StorageResult<Vec<Relationship>> {
        self.query_rows(
            "SELECT * FROM relationships ORDER BY source, target, kind",
            None,
        )
        .await
    }
}

/// SurrealDB-backed implementation of [`ReceiptLedger`].
#[derive(Clone)]
pub struct SurrealReceiptLedger {
    handle: SurrealHandle,
    writers: Arc<KeyedLocks>,
}

impl SurrealReceiptLedger {
    pub fn new(handle: SurrealHandle) -> Self {
        Self {
            handle,
            writers: Arc::new(KeyedLocks::new()),
        }
    }
}

#[async_trait]
impl ReceiptLedger for SurrealReceiptLedger {
    async fn get(&self, delivery_id: &str) -> StorageResult<Option<PublicationReceipt>> {
        let row: Option<ReceiptRow> = self
            .handle
            .db()
            .select((RECEIPTS, delivery_id.to_string()))
            .await?;
        Ok(row.map(PublicationReceipt::from))
    }

    #[instrument(skip(self, receipt), fields(delivery_id = %receipt.delivery_id))]
    async fn record(&self, receipt: PublicationReceipt) -> StorageResult<PublicationReceipt> {
        let _guard = self.writers.lock(&receipt.delivery_id).await;

        if let Some(existing) = self.get(&receipt.delivery_id).await? {
            debug!("receipt already recorded");
            return Ok(existing);
        }

        let created: Option<ReceiptRow> = self
            .handle
            .db()
            .create((RECEIPTS, receipt.delivery_id.clone()))
            .content(ReceiptRow::from(&receipt))
            .await?;

        created
            .map(PublicationReceipt::from)
            .ok_or_else(|| StorageError::Backend("create returned no receipt row".to_string()))
    }
}
