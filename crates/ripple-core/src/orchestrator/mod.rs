//! Event lifecycle: per-PR gating, stage sequencing, terminal outcomes.

pub mod gate;
pub mod pipeline;
pub mod state;

pub use gate::{PrGate, PrTicket, PrToken};
pub use pipeline::{Orchestrator, OrchestratorConfig, TIMEOUT_REASON};
pub use state::{EventOutcome, PipelineState, Stage, Transition};
