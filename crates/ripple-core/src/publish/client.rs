//! Idempotent publication of analyses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use ripple_state::{KeyedLocks, PublicationReceipt, ReceiptLedger, RepoId, StorageError};
use tracing::{info, instrument, warn};

use super::host::{CommentHost, HostError, PostedComment};
use super::render::render_comment;
use crate::domain::{AnalysisResult, ImpactReport, PipelineError, PipelineResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::retry::RetryPolicy;

/// Posts each delivery's analysis at most once.
///
/// The receipt ledger is checked under a per-delivery lock, so concurrent
/// publishes of one delivery id produce a single comment. A comment whose
/// receipt could not be stored is kept as pending and recorded on the next
/// publish of its delivery instead of being posted again.
pub struct PublicationClient {
    host: Arc<dyn CommentHost>,
    ledger: Arc<dyn ReceiptLedger>,
    locks: KeyedLocks,
    policy: RetryPolicy,
    record_policy: RetryPolicy,
    pending: Mutex<HashMap<String, PublicationReceipt>>,
}

impl PublicationClient {
    pub fn new(host: Arc<dyn CommentHost>, ledger: Arc<dyn ReceiptLedger>) -> Self {
        Self {
            host,
            ledger,
            locks: KeyedLocks::new(),
            policy: RetryPolicy::default(),
            record_policy: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                factor: 2,
                max_delay_ms: 1_000,
            },
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy for storing receipts after a successful post.
    pub fn with_record_policy(mut self, policy: RetryPolicy) -> Self {
        self.record_policy = policy;
        self
    }

    /// Receipt already stored for `delivery_id`, if any.
    pub async fn receipt(&self, delivery_id: &str) -> PipelineResult<Option<PublicationReceipt>> {
        Ok(self.ledger.get(delivery_id).await?)
    }

    pub async fn publish(
        &self,
        repo: &RepoId,
        pr_id: u64,
        result: &AnalysisResult,
        delivery_id: &str,
    ) -> PipelineResult<PublicationReceipt> {
        self.publish_with_impact(repo, pr_id, result, None, delivery_id)
            .await
    }

    /// Like [`publish`](Self::publish), with an impact section in the comment.
    #[instrument(
        skip(self, result, impact),
        fields(repo = %repo, pr_id, delivery_id = %delivery_id)
    )]
    pub async fn publish_with_impact(
        &self,
        repo: &RepoId,
        pr_id: u64,
        result: &AnalysisResult,
        impact: Option<&ImpactReport>,
        delivery_id: &str,
    ) -> PipelineResult<PublicationReceipt> {
        let _guard = self.locks.lock(delivery_id).await;

        if let Some(existing) = self.ledger.get(delivery_id).await? {
            METRICS.inc_publication_replays();
            obs::emit_publication_replayed(delivery_id, existing.comment_id);
            return Ok(existing);
        }

        if let Some(pending) = self.take_pending(delivery_id) {
            info!(comment_id = pending.comment_id, "recording receipt of earlier post");
            return self.record_with_retry(pending).await;
        }

        let body = render_comment(result, impact, delivery_id);
        let posted = self.post_with_retry(repo, pr_id, &body).await?;
        METRICS.inc_comments_posted();
        info!(comment_id = posted.id, "analysis published");

        let receipt = PublicationReceipt {
            delivery_id: delivery_id.to_string(),
            repo: repo.clone(),
            pr_id,
            comment_id: posted.id,
            comment_url: posted.url,
            published_at: Utc::now(),
        };
        self.record_with_retry(receipt).await
    }

    fn take_pending(&self, delivery_id: &str) -> Option<PublicationReceipt> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(delivery_id)
    }

    /// Store `receipt`, retrying backend failures. On final failure the
    /// receipt is parked as pending so the comment is not posted twice.
    async fn record_with_retry(
        &self,
        receipt: PublicationReceipt,
    ) -> PipelineResult<PublicationReceipt> {
        let max_attempts = self.record_policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ledger.record(receipt.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.record_policy.delay_for(attempt);
                    warn!(attempt, error = %e, "receipt write failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(self.park(receipt, e)),
            }
        }
    }

    fn park(&self, receipt: PublicationReceipt, err: StorageError) -> PipelineError {
        warn!(
            comment_id = receipt.comment_id,
            error = %err,
            "receipt not stored; comment kept as pending"
        );
        let comment_id = receipt.comment_id;
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(receipt.delivery_id.clone(), receipt);
        match PipelineError::from(err) {
            PipelineError::Storage(msg) => {
                PipelineError::Storage(format!("{msg} (comment {comment_id} already posted)"))
            }
            other => other,
        }
    }

    async fn post_with_retry(
        &self,
        repo: &RepoId,
        pr_id: u64,
        body: &str,
    ) -> PipelineResult<PostedComment> {
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.host.post_comment(repo, pr_id, body).await {
                Ok(posted) => return Ok(posted),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    obs::emit_publication_retry(attempt, &e, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "publication failed");
                    return Err(host_error(e));
                }
            }
        }
    }
}

fn host_error(err: HostError) -> PipelineError {
    match err {
        HostError::Unreachable(_) => PipelineError::TransientExternal(err.to_string()),
        HostError::InvalidResponse(_) => PipelineError::MalformedResponse(err.to_string()),
        HostError::PermissionDenied { .. }
        | HostError::Rejected { .. }
        | HostError::InvalidRepo(_) => PipelineError::PermanentRequest(err.to_string()),
    }
}
