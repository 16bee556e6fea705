//! Row layouts for Ripple's SurrealDB tables
//!
//! Tables:
//! - relationships: one row per `(source, target, kind)`, id = triple digest
//! - publication_receipts: one row per delivery id

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{PublicationReceipt, Relationship, RelationshipKind, RepoId};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

pub(crate) const RELATIONSHIPS: &str = "relationships";
pub(crate) const RECEIPTS: &str = "publication_receipts";

/// Stored relationship row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RelationshipRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub source: String,
    pub target: String,
    /// Kebab-case kind tag
    pub kind: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl RelationshipRow {
    pub fn from_relationship(rel: &Relationship) -> Self {
        Self {
            id: None,
            source: rel.source.to_string(),
            target: rel.target.to_string(),
            kind: rel.kind.as_str().to_string(),
            metadata: rel.metadata.clone(),
            created_at: rel.created_at,
        }
    }

    pub fn into_relationship(self) -> Result<Relationship, StorageError> {
        let kind: RelationshipKind = self.kind.parse()?;
        Ok(Relationship {
            source: RepoId::new(self.source),
            target: RepoId::new(self.target),
            kind,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

/// Stored receipt row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReceiptRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub delivery_id: String,
    pub repo: String,
    pub pr_id: u64,
    pub comment_id: u64,
    pub comment_url: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub published_at: DateTime<Utc>,
}

impl From<&PublicationReceipt> for ReceiptRow {
    fn from(receipt: &PublicationReceipt) -> Self {
        Self {
            id: None,
            delivery_id: receipt.delivery_id.clone(),
            repo: receipt.repo.to_string(),
            pr_id: receipt.pr_id,
            comment_id: receipt.comment_id,
            comment_url: receipt.comment_url.clone(),
            published_at: receipt.published_at,
        }
    }
}

impl From<ReceiptRow> for PublicationReceipt {
    fn from(row: ReceiptRow) -> Self {
        Self {
            delivery_id: row.delivery_id,
            repo: RepoId::new(row.repo),
            pr_id: row.pr_id,
            comment_id: row.comment_id,
            comment_url: row.comment_url,
            published_at: row.published_at,
        }
    }
}
