//! Ripple configuration: a TOML file plus `RIPPLE_*` environment overrides.
//!
//! ```toml
//! [store]
//! url = "surrealkv://.ripple/db"
//!
//! [reasoning]
//! model = "gpt-4"
//!
//! [[impact.rules]]
//! prefix = "api/"
//! visibility = "api-contract"
//!
//! [impact.visibility]
//! shared-schema = ["depends-on"]
//!
//! [impact.tests]
//! api = ["tests/api_contract.rs"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use ripple_state::{RelationshipKind, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{PipelineError, PipelineResult};
use crate::impact::{ModuleClassifier, ModuleRule, StaticTestIndex, Visibility, VisibilityPolicy};
use crate::orchestrator::OrchestratorConfig;
use crate::reasoning::OutputBounds;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "ripple.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    pub store: StoreSettings,
    pub reasoning: ReasoningSettings,
    pub github: GitHubSettings,
    pub context: ContextSettings,
    pub orchestrator: OrchestratorSettings,
    pub impact: ImpactSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub url: String,
    pub namespace: String,
    pub database: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let base = StoreConfig::default();
        Self {
            url: base.url,
            namespace: base.namespace,
            database: base.database,
        }
    }
}

/// Reasoning service endpoint and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningSettings {
    /// Full `/chat/completions` URL.
    pub url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub bounds: OutputBounds,
    pub retry: RetryPolicy,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 2000,
            timeout_secs: 60,
            bounds: OutputBounds::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Byte budget for one analysis context.
    pub budget_bytes: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { budget_bytes: 16_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub event_timeout_secs: u64,
    pub local_retries: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let base = OrchestratorConfig::default();
        Self {
            event_timeout_secs: base.event_timeout.as_secs(),
            local_retries: base.local_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactSettings {
    /// Path-prefix classification rules, longest prefix wins.
    pub rules: Vec<ModuleRule>,
    /// Per-class overrides of the allowed relationship kinds.
    pub visibility: BTreeMap<Visibility, Vec<RelationshipKind>>,
    /// Module id → test paths.
    pub tests: BTreeMap<String, Vec<String>>,
    pub follow_outgoing: bool,
}

impl Default for ImpactSettings {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            visibility: BTreeMap::new(),
            tests: BTreeMap::new(),
            follow_outgoing: true,
        }
    }
}

impl RippleConfig {
    /// Load `path`, or `ripple.toml` in the working directory when present,
    /// or defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config(format!("invalid config: {}", e)))
    }

    /// Apply `RIPPLE_*` overrides read through `lookup`.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PipelineResult<()> {
        if let Some(url) = lookup("RIPPLE_STORE_URL") {
            self.store.url = url;
        }
        if let Some(url) = lookup("RIPPLE_REASONING_URL") {
            self.reasoning.url = url;
        }
        if let Some(model) = lookup("RIPPLE_REASONING_MODEL") {
            self.reasoning.model = model;
        }
        if let Some(key) = lookup("RIPPLE_REASONING_API_KEY") {
            self.reasoning.api_key = Some(key);
        }
        if let Some(token) = lookup("RIPPLE_GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(api) = lookup("RIPPLE_GITHUB_API") {
            self.github.api_base = api;
        }
        if let Some(budget) = lookup("RIPPLE_CONTEXT_BUDGET") {
            self.context.budget_bytes = budget.trim().parse().map_err(|_| {
                PipelineError::Config(format!(
                    "RIPPLE_CONTEXT_BUDGET is not a byte count: {budget}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.store.url.clone())
            .with_namespace(self.store.namespace.clone())
            .with_database(self.store.database.clone())
    }

    pub fn classifier(&self) -> ModuleClassifier {
        ModuleClassifier::new(self.impact.rules.iter().cloned())
    }

    pub fn policy(&self) -> VisibilityPolicy {
        self.impact
            .visibility
            .iter()
            .fold(VisibilityPolicy::default(), |policy, (class, kinds)| {
                policy.with_override(*class, kinds.iter().copied())
            })
    }

    pub fn test_index(&self) -> StaticTestIndex {
        StaticTestIndex::from_map(&self.impact.tests)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            event_timeout: Duration::from_secs(self.orchestrator.event_timeout_secs),
            local_retries: self.orchestrator.local_retries,
            ..OrchestratorConfig::default()
        }
    }
}
