//! GitHub REST comment host.

use std::time::Duration;

use async_trait::async_trait;
use ripple_state::RepoId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::host::{CommentHost, HostError, PostedComment};
use crate::config::GitHubSettings;
use crate::domain::analysis::truncate_utf8;
use crate::domain::{PipelineError, PipelineResult};

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct CreateComment<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedComment {
    id: u64,
    html_url: Option<String>,
}

/// Posts issue comments via `POST /repos/{owner}/{name}/issues/{pr}/comments`.
pub struct GitHubCommentHost {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubCommentHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubCommentHost")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitHubCommentHost {
    pub fn from_settings(settings: &GitHubSettings) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ripple/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn comments_url(&self, repo: &RepoId, pr_id: u64) -> Result<String, HostError> {
        let (owner, name) = repo
            .as_str()
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| HostError::InvalidRepo(repo.to_string()))?;
        Ok(format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, owner, name, pr_id
        ))
    }
}

#[async_trait]
impl CommentHost for GitHubCommentHost {
    async fn post_comment(
        &self,
        repo: &RepoId,
        pr_id: u64,
        body: &str,
    ) -> Result<PostedComment, HostError> {
        let url = self.comments_url(repo, pr_id)?;
        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CreateComment { body });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HostError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), repo = %repo, pr_id, "comment rejected by GitHub");
            return Err(HostError::from_status(
                status.as_u16(),
                truncate_utf8(&text, MAX_ERROR_BODY),
            ));
        }

        let created: CreatedComment = response
            .json()
            .await
            .map_err(|e| HostError::InvalidResponse(e.to_string()))?;
        debug!(comment_id = created.id, "comment created");
        Ok(PostedComment {
            id: created.id,
            url: created.html_url,
        })
    }
}
