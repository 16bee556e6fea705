//! The per-event pipeline: map, build context, analyze, publish.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::join_all;
use ripple_state::PublicationReceipt;
use tracing::{warn, Instrument};

use super::gate::{PrGate, PrTicket};
use super::state::{EventOutcome, PipelineState, Stage, Transition};
use crate::context::build_with_prior;
use crate::domain::{AnalysisResult, ImpactReport, PipelineResult, PrEvent, PrMetadata};
use crate::impact::DependencyMapper;
use crate::metrics::METRICS;
use crate::obs::{self, EventSpan};
use crate::publish::PublicationClient;
use crate::reasoning::ReasoningClient;
use crate::retry::RetryPolicy;

pub const TIMEOUT_REASON: &str = "timeout";

/// Knobs for one [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on one event, including the wait for its PR token.
    pub event_timeout: Duration,
    /// Attempts for the local stages (mapping, context building).
    pub local_retries: u32,
    /// Delay between local attempts.
    pub local_backoff: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_timeout: Duration::from_secs(300),
            local_retries: 3,
            local_backoff: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                factor: 2,
                max_delay_ms: 1_000,
            },
        }
    }
}

/// Why `drive` stopped short of `Done`.
enum Halt {
    Failed(Stage, String),
    Superseded(Stage),
}

struct Progress {
    stage: Stage,
    history: Vec<Transition>,
    impact: Option<ImpactReport>,
    analysis: Option<AnalysisResult>,
    receipt: Option<PublicationReceipt>,
    replayed: bool,
}

/// Progress shared between the running pipeline and the timeout handler.
struct Tracker {
    delivery_id: String,
    inner: Mutex<Progress>,
}

impl Tracker {
    fn new(delivery_id: &str) -> Self {
        let tracker = Self {
            delivery_id: delivery_id.to_string(),
            inner: Mutex::new(Progress {
                stage: Stage::Received,
                history: Vec::new(),
                impact: None,
                analysis: None,
                receipt: None,
                replayed: false,
            }),
        };
        tracker.record(PipelineState::Received);
        tracker
    }

    fn with<R>(&self, f: impl FnOnce(&mut Progress) -> R) -> R {
        let mut progress = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut progress)
    }

    fn record(&self, state: PipelineState) {
        obs::emit_transition(&self.delivery_id, &state);
        self.with(|p| p.history.push(Transition::now(state)));
    }

    fn enter(&self, stage: Stage) {
        self.with(|p| p.stage = stage);
        self.record(stage.into());
    }

    fn stage(&self) -> Stage {
        self.with(|p| p.stage)
    }

    fn into_inner(self) -> Progress {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sequences one event through the pipeline.
///
/// Shared via `Arc`; events for different PRs run concurrently while events
/// for the same PR are serialized by a [`PrGate`].
pub struct Orchestrator {
    mapper: DependencyMapper,
    reasoning: ReasoningClient,
    publisher: PublicationClient,
    context_budget: usize,
    config: OrchestratorConfig,
    gate: PrGate,
}

impl Orchestrator {
    pub fn new(
        mapper: DependencyMapper,
        reasoning: ReasoningClient,
        publisher: PublicationClient,
        context_budget: usize,
    ) -> Self {
        Self {
            mapper,
            reasoning,
            publisher,
            context_budget,
            config: OrchestratorConfig::default(),
            gate: PrGate::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gate(&self) -> &PrGate {
        &self.gate
    }

    /// Run `event` to a terminal state. Never returns an error; failures are
    /// reported through [`EventOutcome::final_state`].
    pub async fn handle(&self, event: PrEvent) -> EventOutcome {
        let span = EventSpan::new(&event);
        self.handle_inner(event).instrument(span.span()).await
    }

    /// Handle several events concurrently, preserving input order in the result.
    pub async fn handle_batch(&self, events: Vec<PrEvent>) -> Vec<EventOutcome> {
        join_all(events.into_iter().map(|event| self.handle(event))).await
    }

    async fn handle_inner(&self, event: PrEvent) -> EventOutcome {
        METRICS.inc_events_received();
        obs::emit_pipeline_received(&event);
        let tracker = Tracker::new(&event.delivery_id);

        if let Err(e) = event.validate() {
            let halt = Halt::Failed(Stage::Received, e.to_string());
            return self.finish(&event, tracker, Err(halt));
        }

        let result = match tokio::time::timeout(
            self.config.event_timeout,
            self.run(&event, &tracker),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Halt::Failed(tracker.stage(), TIMEOUT_REASON.to_string())),
        };
        self.finish(&event, tracker, result)
    }

    /// Replays short-circuit before a ticket is taken, so a redelivery of a
    /// published event leaves newer events for the PR untouched.
    async fn run(&self, event: &PrEvent, tracker: &Tracker) -> Result<(), Halt> {
        if self.replay(event, tracker).await? {
            return Ok(());
        }
        let ticket = self.gate.ticket(&event.pr_key(), &event.delivery_id);
        self.drive(event, &ticket, tracker).await
    }

    async fn drive(
        &self,
        event: &PrEvent,
        ticket: &PrTicket,
        tracker: &Tracker,
    ) -> Result<(), Halt> {
        let _token = ticket.acquire().await;

        // A concurrent copy of this delivery may have published while we waited.
        if self.replay(event, tracker).await? {
            return Ok(());
        }

        self.advance(ticket, tracker, Stage::Mapping)?;
        let impact = self
            .local(Stage::Mapping, move || self.mapper.map(&event.repo, &event.change_set))
            .await?;
        tracker.with(|p| p.impact = Some(impact.clone()));

        self.advance(ticket, tracker, Stage::ContextBuilt)?;
        let prior = event.metadata.as_ref().map(PrMetadata::render);
        let (impact_ref, prior_ref) = (&impact, prior.as_deref());
        let context = self
            .local(Stage::ContextBuilt, move || async move {
                build_with_prior(&event.change_set, impact_ref, self.context_budget, prior_ref)
            })
            .await?;

        self.advance(ticket, tracker, Stage::Analyzing)?;
        let analysis = self
            .reasoning
            .analyze(&context)
            .await
            .map_err(|e| Halt::Failed(Stage::Analyzing, e.to_string()))?;
        tracker.with(|p| p.analysis = Some(analysis.clone()));

        self.advance(ticket, tracker, Stage::Publishing)?;
        let receipt = self
            .publisher
            .publish_with_impact(
                &event.repo,
                event.pr_id,
                &analysis,
                Some(&impact),
                &event.delivery_id,
            )
            .await
            .map_err(|e| Halt::Failed(Stage::Publishing, e.to_string()))?;
        tracker.with(|p| p.receipt = Some(receipt));
        Ok(())
    }

    /// Load a stored receipt for the delivery into `tracker`. True on a hit.
    async fn replay(&self, event: &PrEvent, tracker: &Tracker) -> Result<bool, Halt> {
        let existing = self
            .local(Stage::Received, move || self.publisher.receipt(&event.delivery_id))
            .await?;
        let Some(receipt) = existing else {
            return Ok(false);
        };
        tracker.with(|p| {
            p.receipt = Some(receipt);
            p.replayed = true;
        });
        Ok(true)
    }

    /// Stage boundary: stop if a newer event for the PR arrived, else enter `next`.
    fn advance(&self, ticket: &PrTicket, tracker: &Tracker, next: Stage) -> Result<(), Halt> {
        if ticket.is_superseded() {
            return Err(Halt::Superseded(tracker.stage()));
        }
        tracker.enter(next);
        Ok(())
    }

    /// Run a local operation, retrying retryable errors up to `local_retries` attempts.
    async fn local<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T, Halt>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let max_attempts = self.config.local_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.local_backoff.delay_for(attempt);
                    warn!(stage = %stage, attempt, error = %e, "local stage failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(Halt::Failed(stage, e.to_string())),
            }
        }
    }

    fn finish(&self, event: &PrEvent, tracker: Tracker, result: Result<(), Halt>) -> EventOutcome {
        let final_state = match result {
            Ok(()) => PipelineState::Done,
            Err(Halt::Failed(stage, reason)) => {
                METRICS.inc_events_failed();
                obs::emit_pipeline_failed(event, stage, &reason);
                PipelineState::Failed { stage, reason }
            }
            Err(Halt::Superseded(stage)) => {
                METRICS.inc_events_superseded();
                obs::emit_pipeline_superseded(event, stage);
                PipelineState::Superseded
            }
        };
        tracker.record(final_state.clone());
        let progress = tracker.into_inner();

        if final_state == PipelineState::Done {
            METRICS.inc_events_done();
            obs::emit_pipeline_done(
                event,
                progress.impact.as_ref().map_or(0, |i| i.impacted_repos.len()),
                progress.receipt.as_ref().map(|r| r.comment_id),
                progress.replayed,
            );
        }

        EventOutcome {
            delivery_id: event.delivery_id.clone(),
            repo: event.repo.clone(),
            pr_id: event.pr_id,
            commit_sha: event.commit_sha.clone(),
            final_state,
            history: progress.history,
            impact: progress.impact,
            analysis: progress.analysis,
            receipt: progress.receipt,
            replayed: progress.replayed,
        }
    }
}
