//! Pipeline error taxonomy.

use ripple_state::StorageError;

/// Errors produced by the impact-analysis pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Timeouts, rate limits, unreachable hosts.
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// Malformed or unauthorized request; retrying cannot help.
    #[error("permanent request failure: {0}")]
    PermanentRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("context budget exceeded: impact summary needs {required} bytes, budget is {budget}")]
    BudgetExceeded { required: usize, budget: usize },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether a local retry of the failed step may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientExternal(_) | PipelineError::Storage(_)
        )
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { .. } => PipelineError::Conflict(err.to_string()),
            StorageError::Backend(_) => PipelineError::Storage(err.to_string()),
            StorageError::InvalidRelationship { .. }
            | StorageError::UnknownKind { .. }
            | StorageError::Serialization(_) => PipelineError::PermanentRequest(err.to_string()),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
