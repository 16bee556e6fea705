//! Source-control host abstraction for posting PR comments.

use async_trait::async_trait;
use ripple_state::RepoId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// 401/403/404: the token cannot write to this PR.
    #[error("permission denied: HTTP {status}: {message}")]
    PermissionDenied { status: u16, message: String },

    /// 5xx, 429, timeouts, connection failures.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("request rejected: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid repository id: {0}")]
    InvalidRepo(String),

    /// The comment was accepted but the reply could not be read.
    #[error("unreadable host response: {0}")]
    InvalidResponse(String),
}

impl HostError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 | 404 => HostError::PermissionDenied { status, message },
            408 | 429 | 500..=599 => {
                HostError::Unreachable(format!("HTTP {}: {}", status, message))
            }
            _ => HostError::Rejected { status, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HostError::Unreachable(_))
    }
}

/// A comment as created by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub id: u64,
    pub url: Option<String>,
}

/// The single external write of the publication step.
#[async_trait]
pub trait CommentHost: Send + Sync {
    async fn post_comment(
        &self,
        repo: &RepoId,
        pr_id: u64,
        body: &str,
    ) -> Result<PostedComment, HostError>;
}
