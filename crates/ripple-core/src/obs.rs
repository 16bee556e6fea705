//! Structured observability hooks for the pipeline lifecycle.
//!
//! This module provides:
//! - Event-scoped tracing spans via the `EventSpan` guard
//! - Emission functions for lifecycle events: received, transition,
//!   done, failed, superseded, external retries and publication replays
//!
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use std::time::Duration;

use tracing::{info, warn, Span};

use crate::domain::PrEvent;
use crate::orchestrator::state::{PipelineState, Stage};

/// Span carrying `delivery_id`, `repo`, `pr_id` and `commit_sha` for one event.
///
/// Use [`EventSpan::span`] with `tracing::Instrument` inside async code and
/// [`EventSpan::enter`] in synchronous code.
pub struct EventSpan {
    span: Span,
}

impl EventSpan {
    pub fn new(event: &PrEvent) -> Self {
        let span = tracing::info_span!(
            "ripple.event",
            delivery_id = %event.delivery_id,
            repo = %event.repo,
            pr_id = event.pr_id,
            commit_sha = %event.commit_sha,
        );
        Self { span }
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn enter(self) -> tracing::span::EnteredSpan {
        self.span.entered()
    }
}

pub fn emit_pipeline_received(event: &PrEvent) {
    info!(
        event = "pipeline.received",
        delivery_id = %event.delivery_id,
        repo = %event.repo,
        pr_id = event.pr_id,
        commit_sha = %event.commit_sha,
        files = event.change_set.len(),
    );
}

pub fn emit_transition(delivery_id: &str, state: &PipelineState) {
    info!(event = "pipeline.transition", delivery_id = %delivery_id, state = %state.name());
}

/// Emit event: terminal `Done`.
pub fn emit_pipeline_done(
    event: &PrEvent,
    impacted_repos: usize,
    comment_id: Option<u64>,
    replayed: bool,
) {
    info!(
        event = "pipeline.done",
        delivery_id = %event.delivery_id,
        repo = %event.repo,
        pr_id = event.pr_id,
        commit_sha = %event.commit_sha,
        impacted_repos = impacted_repos,
        comment_id = comment_id,
        replayed = replayed,
    );
}

/// Emit event: terminal `Failed(stage, reason)` (warning level).
pub fn emit_pipeline_failed(event: &PrEvent, stage: Stage, reason: &str) {
    warn!(
        event = "pipeline.failed",
        delivery_id = %event.delivery_id,
        repo = %event.repo,
        pr_id = event.pr_id,
        commit_sha = %event.commit_sha,
        stage = %stage,
        reason = %reason,
    );
}

pub fn emit_pipeline_superseded(event: &PrEvent, stage: Stage) {
    info!(
        event = "pipeline.superseded",
        delivery_id = %event.delivery_id,
        repo = %event.repo,
        pr_id = event.pr_id,
        commit_sha = %event.commit_sha,
        stage = %stage,
    );
}

pub fn emit_reasoning_retry(attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
    warn!(
        event = "reasoning.retry",
        attempt = attempt,
        error = %error,
        delay_ms = delay.as_millis() as u64,
    );
}

pub fn emit_publication_retry(attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
    warn!(
        event = "publication.retry",
        attempt = attempt,
        error = %error,
        delay_ms = delay.as_millis() as u64,
    );
}

/// Emit event: a delivery was already published; the stored receipt is reused.
pub fn emit_publication_replayed(delivery_id: &str, comment_id: u64) {
    info!(event = "publication.replayed", delivery_id = %delivery_id, comment_id = comment_id);
}
