//! Single-call reasoning backend abstraction.

use async_trait::async_trait;

use crate::domain::AnalysisContext;

/// Failure of one backend call, classified by what a retry can achieve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by reasoning service")]
    RateLimited,

    #[error("reasoning service error: HTTP {status}")]
    Server { status: u16 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request rejected: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// 2xx response whose envelope could not be read
    #[error("unreadable response body: {0}")]
    InvalidBody(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            408 => BackendError::Timeout,
            429 => BackendError::RateLimited,
            500..=599 => BackendError::Server { status },
            _ => BackendError::Rejected {
                status,
                message: message.into(),
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout
                | BackendError::RateLimited
                | BackendError::Server { .. }
                | BackendError::Connection(_)
        )
    }
}

/// One completion request against the external reasoning service.
///
/// Implementations return the raw assistant text; parsing and retries live
/// in [`super::ReasoningClient`].
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, context: &AnalysisContext) -> Result<String, BackendError>;
}
