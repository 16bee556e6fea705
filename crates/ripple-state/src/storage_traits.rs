//! Storage trait definitions for Ripple
//!
//! These traits define the persistence abstractions the pipeline depends on:
//! - `RelationshipStore`: directed, typed repository-to-repository edges
//! - `ReceiptLedger`: published PR comments keyed by delivery id
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! via the `fakes` module; SurrealDB implementations live in `surreal_store`.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque repository identifier, canonically `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    pub fn new(id: impl Into<String>) -> Self {
        RepoId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepoId {
    fn from(s: &str) -> Self {
        RepoId(s.to_string())
    }
}

impl From<String> for RepoId {
    fn from(s: String) -> Self {
        RepoId(s)
    }
}

// ---------------------------------------------------------------------------
// RelationshipStore
// ---------------------------------------------------------------------------

/// Type tag on a relationship edge.
///
/// Ordered by the kebab-case name, the same order the database applies to
/// the stored string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    DependsOn,
    SharedLibrary,
    SameDomain,
    ConsumerOfApi,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 4] = [
        RelationshipKind::DependsOn,
        RelationshipKind::SharedLibrary,
        RelationshipKind::SameDomain,
        RelationshipKind::ConsumerOfApi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::DependsOn => "depends-on",
            RelationshipKind::SharedLibrary => "shared-library",
            RelationshipKind::SameDomain => "same-domain",
            RelationshipKind::ConsumerOfApi => "consumer-of-api",
        }
    }
}

impl Ord for RelationshipKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for RelationshipKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        RelationshipKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| StorageError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Unique key of a relationship: the `(source, target, kind)` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationshipKey {
    pub source: RepoId,
    pub target: RepoId,
    pub kind: RelationshipKind,
}

impl RelationshipKey {
    pub fn new(source: &RepoId, target: &RepoId, kind: RelationshipKind) -> Self {
        Self {
            source: source.clone(),
            target: target.clone(),
            kind,
        }
    }

    /// SHA-256 hex digest of the triple; stable record id for backends.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.target.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.kind.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Reject self-edges and empty repository ids.
    pub fn validate(&self) -> StorageResult<()> {
        if self.source.as_str().trim().is_empty() || self.target.as_str().trim().is_empty() {
            return Err(StorageError::InvalidRelationship {
                reason: "repository ids must not be empty".to_string(),
            });
        }
        if self.source == self.target {
            return Err(StorageError::InvalidRelationship {
                reason: format!("{} cannot relate to itself", self.source),
            });
        }
        Ok(())
    }

    pub(crate) fn conflict(&self) -> StorageError {
        StorageError::Conflict {
            from: self.source.to_string(),
            to: self.target.to_string(),
            kind: self.kind.to_string(),
        }
    }
}

/// A directed, typed edge between two repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: RepoId,
    pub target: RepoId,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::new(&self.source, &self.target, self.kind)
    }
}

/// Durable repository relationship graph.
///
/// Guarantees:
/// - No two stored relationships share a `(source, target, kind)` triple;
///   a duplicate `add` fails with `StorageError::Conflict`.
/// - Reads reflect the latest completed write.
/// - Writes to the same triple are serialized; a write either fully applies
///   or returns an error.
/// - Results are ordered by `(source, target, kind)`.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Store a new relationship.
    async fn add(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
        metadata: BTreeMap<String, String>,
    ) -> StorageResult<Relationship>;

    /// Delete a relationship. Returns whether it existed.
    async fn remove(
        &self,
        source: &RepoId,
        target: &RepoId,
        kind: RelationshipKind,
    ) -> StorageResult<bool>;

    /// Relationships declared by `repo` (`source == repo`).
    async fn outgoing(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>>;

    /// Relationships pointing at `repo` (`target == repo`).
    async fn incoming(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>>;

    /// Every stored relationship.
    async fn list(&self) -> StorageResult<Vec<Relationship>>;
}

// ---------------------------------------------------------------------------
// ReceiptLedger
// ---------------------------------------------------------------------------

/// Proof that an analysis was posted to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationReceipt {
    pub delivery_id: String,
    pub repo: RepoId,
    pub pr_id: u64,
    /// Comment id assigned by the source-control host
    pub comment_id: u64,
    pub comment_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Ledger of published comments, keyed by webhook delivery id.
///
/// Guarantees:
/// - `record` is first-write-wins: if a receipt already exists for the
///   delivery id, the stored receipt is returned unchanged.
/// - `get` returns exactly what `record` stored.
#[async_trait]
pub trait ReceiptLedger: Send + Sync {
    /// Look up the receipt for a delivery id.
    async fn get(&self, delivery_id: &str) -> StorageResult<Option<PublicationReceipt>>;

    /// Persist a receipt, returning the one that is stored afterwards.
    async fn record(&self, receipt: PublicationReceipt) -> StorageResult<PublicationReceipt>;
}
