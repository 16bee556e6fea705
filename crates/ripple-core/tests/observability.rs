//! Structured tracing for the pipeline lifecycle.
//!
//! Verifies that lifecycle events carry their `event` name and identifying
//! fields, and that the global counters move.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ripple_core::metrics::METRICS;
use ripple_core::obs::{
    emit_pipeline_failed, emit_pipeline_received, emit_publication_replayed, emit_reasoning_retry,
    EventSpan,
};
use ripple_core::{
    AnalysisContext, BackendError, ChangeSet, CommentHost, DependencyMapper, HostError,
    ModuleClassifier, Orchestrator, PostedComment, PrEvent, PublicationClient, ReasoningBackend,
    ReasoningClient, RepoId, Stage, StaticTestIndex,
};
use ripple_state::fakes::{MemoryReceiptLedger, MemoryRelationshipStore};
use tracing_test::traced_test;

fn event() -> PrEvent {
    PrEvent::new("org/obs", 3, "c0ffee", ChangeSet::empty(), "d-obs")
}

struct FixedBackend;

#[async_trait]
impl ReasoningBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _: &AnalysisContext) -> Result<String, BackendError> {
        Ok(r#"{"summary":"No cross-repo impact","recommendations":[],"risk_level":"low"}"#.into())
    }
}

struct OkHost;

#[async_trait]
impl CommentHost for OkHost {
    async fn post_comment(&self, _: &RepoId, _: u64, _: &str) -> Result<PostedComment, HostError> {
        Ok(PostedComment { id: 77, url: None })
    }
}

#[traced_test]
#[test]
fn test_emit_pipeline_received_logs_identity() {
    emit_pipeline_received(&event());
    assert!(logs_contain("pipeline.received"));
    assert!(logs_contain("d-obs"));
    assert!(logs_contain("c0ffee"));
}

#[traced_test]
#[test]
fn test_emit_pipeline_failed_logs_stage_and_reason() {
    emit_pipeline_failed(&event(), Stage::Publishing, "permission denied");
    assert!(logs_contain("pipeline.failed"));
    assert!(logs_contain("publishing"));
    assert!(logs_contain("permission denied"));
}

#[traced_test]
#[test]
fn test_emit_retry_and_replay() {
    emit_reasoning_retry(2, &"rate limited", Duration::from_millis(2000));
    emit_publication_replayed("d-obs", 77);
    assert!(logs_contain("reasoning.retry"));
    assert!(logs_contain("delay_ms=2000"));
    assert!(logs_contain("publication.replayed"));
}

#[traced_test]
#[test]
fn test_event_span_enter() {
    let _entered = EventSpan::new(&event()).enter();
    tracing::info!("inside");
    assert!(logs_contain("ripple.event"));
}

#[traced_test]
#[tokio::test]
async fn test_handle_emits_lifecycle_and_counts() {
    let received_before = METRICS.events_received();
    let done_before = METRICS.events_done();
    let posted_before = METRICS.comments_posted();

    let mapper = DependencyMapper::new(
        Arc::new(MemoryRelationshipStore::new()),
        ModuleClassifier::default(),
        Arc::new(StaticTestIndex::new()),
    );
    let orchestrator = Orchestrator::new(
        mapper,
        ReasoningClient::new(Arc::new(FixedBackend)),
        PublicationClient::new(Arc::new(OkHost), Arc::new(MemoryReceiptLedger::new())),
        1024,
    );

    let outcome = orchestrator.handle(event()).await;
    assert!(outcome.is_done(), "{:?}", outcome.final_state);

    assert!(logs_contain("pipeline.received"));
    assert!(logs_contain("pipeline.transition"));
    assert!(logs_contain("pipeline.done"));
    assert!(logs_contain("comment_id=77"));

    assert!(METRICS.events_received() > received_before);
    assert!(METRICS.events_done() > done_before);
    assert!(METRICS.comments_posted() > posted_before);
}
