//! Domain models for Ripple.
//!
//! Canonical definitions for the entities that flow through the pipeline:
//! - `PrEvent` / `ChangeSet`: what arrived
//! - `ImpactReport`: what it touches
//! - `AnalysisContext` / `AnalysisResult`: what was asked and answered

pub mod analysis;
pub mod error;
pub mod event;
pub mod impact;

pub use analysis::{AnalysisContext, AnalysisResult, RiskLevel};
pub use error::{PipelineError, PipelineResult};
pub use event::{ChangeKind, ChangeSet, ChangedFile, PrEvent, PrMetadata};
pub use impact::{ImpactReport, ModulePath, TestPath};
