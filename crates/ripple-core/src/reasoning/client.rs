//! Retrying reasoning client.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::backend::{BackendError, ReasoningBackend};
use super::parse::{parse_analysis, OutputBounds};
use crate::domain::{AnalysisContext, AnalysisResult, PipelineError, PipelineResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::retry::RetryPolicy;

/// Calls a [`ReasoningBackend`] with backoff and validates its output.
///
/// - transient failures (timeout, 5xx, 429, connection) are retried up to
///   the policy's attempt cap;
/// - other 4xx responses fail at once with `PermanentRequest`;
/// - an unparseable reply is retried once, then `MalformedResponse`.
pub struct ReasoningClient {
    backend: Arc<dyn ReasoningBackend>,
    policy: RetryPolicy,
    bounds: OutputBounds,
}

impl ReasoningClient {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            bounds: OutputBounds::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_bounds(mut self, bounds: OutputBounds) -> Self {
        self.bounds = bounds;
        self
    }

    #[instrument(skip_all, fields(backend = %self.backend.name(), context_bytes = context.size()))]
    pub async fn analyze(&self, context: &AnalysisContext) -> PipelineResult<AnalysisResult> {
        let max_attempts = self.policy.attempts();
        let mut malformed_retried = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            METRICS.inc_reasoning_attempts();

            let err = match self.backend.complete(context).await {
                Ok(raw) => match parse_analysis(&raw, &self.bounds) {
                    Ok(result) => {
                        debug!(attempt, risk = %result.risk_level, "analysis accepted");
                        return Ok(result);
                    }
                    Err(reason) => PipelineError::MalformedResponse(reason),
                },
                Err(BackendError::InvalidBody(reason)) => PipelineError::MalformedResponse(reason),
                Err(e) if e.is_transient() => PipelineError::TransientExternal(e.to_string()),
                Err(e) => {
                    warn!(attempt, error = %e, "reasoning request rejected");
                    return Err(PipelineError::PermanentRequest(e.to_string()));
                }
            };

            let may_retry = match &err {
                PipelineError::MalformedResponse(_) => {
                    !std::mem::replace(&mut malformed_retried, true)
                }
                _ => true,
            };
            if !may_retry || attempt >= max_attempts {
                warn!(attempt, error = %err, "reasoning failed");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            obs::emit_reasoning_retry(attempt, &err, delay);
            tokio::time::sleep(delay).await;
        }
    }
}
