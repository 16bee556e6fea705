//! Pipeline states and the per-event outcome record.

use std::fmt;

use chrono::{DateTime, Utc};
use ripple_state::{PublicationReceipt, RepoId};
use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisResult, ImpactReport};

/// Non-terminal stage an event can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Mapping,
    ContextBuilt,
    Analyzing,
    Publishing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Mapping => "mapping",
            Stage::ContextBuilt => "context_built",
            Stage::Analyzing => "analyzing",
            Stage::Publishing => "publishing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Mapping,
    ContextBuilt,
    Analyzing,
    Publishing,
    Done,
    Failed { stage: Stage, reason: String },
    /// A newer event for the same PR took over.
    Superseded,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Mapping => "mapping",
            PipelineState::ContextBuilt => "context_built",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Publishing => "publishing",
            PipelineState::Done => "done",
            PipelineState::Failed { .. } => "failed",
            PipelineState::Superseded => "superseded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Failed { .. } | PipelineState::Superseded
        )
    }
}

impl From<Stage> for PipelineState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Received => PipelineState::Received,
            Stage::Mapping => PipelineState::Mapping,
            Stage::ContextBuilt => PipelineState::ContextBuilt,
            Stage::Analyzing => PipelineState::Analyzing,
            Stage::Publishing => PipelineState::Publishing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(flatten)]
    pub state: PipelineState,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn now(state: PipelineState) -> Self {
        Self { state, at: Utc::now() }
    }
}

/// Everything `handle` learned about one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub delivery_id: String,
    pub repo: RepoId,
    pub pr_id: u64,
    pub commit_sha: String,
    pub final_state: PipelineState,
    /// Every state entered, in order, ending with `final_state`.
    pub history: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PublicationReceipt>,
    /// True when the delivery had already been published.
    pub replayed: bool,
}

impl EventOutcome {
    pub fn is_done(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    pub fn is_superseded(&self) -> bool {
        self.final_state == PipelineState::Superseded
    }

    /// `(stage, reason)` when the event failed.
    pub fn failure(&self) -> Option<(Stage, &str)> {
        match &self.final_state {
            PipelineState::Failed { stage, reason } => Some((*stage, reason.as_str())),
            _ => None,
        }
    }

    pub fn states(&self) -> Vec<&'static str> {
        self.history.iter().map(|t| t.state.name()).collect()
    }
}
