//! Ripple-State: persistence layer for cross-repository impact analysis
//!
//! This crate owns every durable record the analysis pipeline relies on.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: uniqueness of relationship triples, read-your-writes lookups in
//! both edge directions, and idempotent publication receipts.
//!
//! ## Key Components
//!
//! - [`RelationshipStore`]: directed, typed repository relationships
//! - [`ReceiptLedger`]: published comments keyed by webhook delivery id
//! - [`SurrealHandle`]: SurrealDB connection (in-memory, `surrealkv://`, remote)
//! - [`fakes`]: in-memory implementations of both traits

mod error;
pub mod fakes;
mod handle;
pub mod locks;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{StoreConfig, SurrealHandle};
pub use locks::{KeyedGuard, KeyedLocks};
pub use storage_traits::{
    PublicationReceipt, ReceiptLedger, Relationship, RelationshipKey, RelationshipKind,
    RelationshipStore, RepoId, StorageResult,
};
pub use surreal_store::{SurrealReceiptLedger, SurrealRelationshipStore};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
