//! Path-prefix module classification and visibility classes.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use ripple_state::RelationshipKind;
use serde::{Deserialize, Serialize};

use crate::domain::{ModulePath, PipelineError};

/// How far a change to a module can travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Internal,
    ApiContract,
    SharedSchema,
    PublishedLibrary,
}

impl Visibility {
    pub const ALL: [Visibility; 4] = [
        Visibility::Internal,
        Visibility::ApiContract,
        Visibility::SharedSchema,
        Visibility::PublishedLibrary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Internal => "internal",
            Visibility::ApiContract => "api-contract",
            Visibility::SharedSchema => "shared-schema",
            Visibility::PublishedLibrary => "published-library",
        }
    }

    /// Relationship kinds a change of this class can propagate along.
    pub fn default_kinds(self) -> &'static [RelationshipKind] {
        match self {
            Visibility::Internal => &[],
            Visibility::ApiContract => &[RelationshipKind::ConsumerOfApi],
            Visibility::SharedSchema => &[
                RelationshipKind::ConsumerOfApi,
                RelationshipKind::DependsOn,
                RelationshipKind::SameDomain,
            ],
            Visibility::PublishedLibrary => {
                &[RelationshipKind::DependsOn, RelationshipKind::SharedLibrary]
            }
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Visibility::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| PipelineError::Config(format!("unknown visibility class: {}", s)))
    }
}

/// Visibility class → allowed relationship kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPolicy {
    table: BTreeMap<Visibility, BTreeSet<RelationshipKind>>,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        let table = Visibility::ALL
            .into_iter()
            .map(|v| (v, v.default_kinds().iter().copied().collect()))
            .collect();
        Self { table }
    }
}

impl VisibilityPolicy {
    /// Replace the allowed kinds for one class.
    pub fn with_override(
        mut self,
        visibility: Visibility,
        kinds: impl IntoIterator<Item = RelationshipKind>,
    ) -> Self {
        self.table.insert(visibility, kinds.into_iter().collect());
        self
    }

    pub fn allowed(&self, visibility: Visibility) -> impl Iterator<Item = RelationshipKind> + '_ {
        self.table
            .get(&visibility)
            .into_iter()
            .flat_map(|kinds| kinds.iter().copied())
    }

    /// A class is externally visible when at least one kind is allowed.
    pub fn is_externally_visible(&self, visibility: Visibility) -> bool {
        self.allowed(visibility).next().is_some()
    }
}

/// Maps every path under `prefix` to one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRule {
    pub prefix: String,
    /// Module id; defaults to the prefix without its trailing `/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

fn default_visibility() -> Visibility {
    Visibility::Internal
}

impl ModuleRule {
    pub fn new(prefix: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            prefix: prefix.into(),
            module: None,
            visibility,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    fn normalized_prefix(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    pub fn module_id(&self) -> ModulePath {
        match &self.module {
            Some(m) => ModulePath::new(m.clone()),
            None => ModulePath::new(self.normalized_prefix()),
        }
    }

    /// Segment-aware prefix match: `api` matches `api/x` but not `apiary/x`.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.normalized_prefix();
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Longest-prefix classifier over a set of [`ModuleRule`]s.
///
/// For two rules with the same prefix, the one declared first wins.
#[derive(Debug, Clone, Default)]
pub struct ModuleClassifier {
    rules: Vec<ModuleRule>,
}

impl ModuleClassifier {
    pub fn new(rules: impl IntoIterator<Item = ModuleRule>) -> Self {
        let mut rules: Vec<ModuleRule> = rules.into_iter().collect();
        rules.sort_by(|a, b| b.normalized_prefix().len().cmp(&a.normalized_prefix().len()));
        Self { rules }
    }

    pub fn classify(&self, path: &str) -> Option<&ModuleRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[ModuleRule] {
        &self.rules
    }
}
