//! Error types for ripple-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Authentication against a remote server failed
    #[error("Database authentication failed: {0}")]
    Authentication(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Connection(err.to_string())
    }
}

/// Errors returned by the storage traits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The `(source, target, kind)` triple is already stored
    #[error("relationship already exists: {from} -[{kind}]-> {to}")]
    Conflict {
        from: String,
        to: String,
        kind: String,
    },

    /// The relationship violates a structural rule (self-edge, empty id)
    #[error("invalid relationship: {reason}")]
    InvalidRelationship { reason: String },

    /// A relationship kind string did not match any known kind
    #[error("unknown relationship kind: {kind}")]
    UnknownKind { kind: String },

    /// The backing database rejected or failed an operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be converted into a domain record
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same operation could succeed.
    ///
    /// Only backend failures are transient; conflicts and invalid input
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Backend(_))
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_displays_triple() {
        let err = StorageError::Conflict {
            from: "org/a".to_string(),
            to: "org/b".to_string(),
            kind: "depends-on".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("org/a"));
        assert!(msg.contains("org/b"));
        assert!(msg.contains("depends-on"));
    }

    #[test]
    fn test_only_backend_errors_are_retryable() {
        assert!(StorageError::Backend("io".into()).is_retryable());
        assert!(!StorageError::UnknownKind { kind: "x".into() }.is_retryable());
        assert!(!StorageError::InvalidRelationship {
            reason: "self".into()
        }
        .is_retryable());
    }
}
