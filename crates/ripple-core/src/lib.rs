//! Ripple Core Library
//!
//! Cross-repository impact analysis for pull requests: map a change set onto
//! the relationship graph, build a bounded reasoning context, ask the
//! reasoning service for a verdict and publish it back to the PR exactly once.
//!
//! The pieces are wired explicitly and injected as trait objects:
//!
//! - [`DependencyMapper`] over a [`ripple_state::RelationshipStore`]
//! - [`context::build`] for the byte-budgeted [`AnalysisContext`]
//! - [`ReasoningClient`] over a [`ReasoningBackend`]
//! - [`PublicationClient`] over a [`CommentHost`] and a receipt ledger
//! - [`Orchestrator`] sequencing one [`PrEvent`] through all of the above

pub mod config;
pub mod context;
pub mod domain;
pub mod impact;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod publish;
pub mod reasoning;
pub mod retry;
pub mod telemetry;

pub use config::{GitHubSettings, ReasoningSettings, RippleConfig};
pub use domain::{
    AnalysisContext, AnalysisResult, ChangeKind, ChangeSet, ChangedFile, ImpactReport, ModulePath,
    PipelineError, PipelineResult, PrEvent, PrMetadata, RiskLevel, TestPath,
};
pub use impact::{
    DependencyMapper, ModuleClassifier, ModuleRule, StaticTestIndex, TestIndex, Visibility,
    VisibilityPolicy,
};
pub use orchestrator::{EventOutcome, Orchestrator, OrchestratorConfig, PipelineState, Stage};
pub use publish::{CommentHost, GitHubCommentHost, HostError, PostedComment, PublicationClient};
pub use reasoning::{
    BackendError, HttpReasoningBackend, OutputBounds, ReasoningBackend, ReasoningClient,
};
pub use retry::RetryPolicy;

pub use ripple_state::{
    PublicationReceipt, ReceiptLedger, Relationship, RelationshipKind, RelationshipStore, RepoId,
    StoreConfig, SurrealHandle,
};
