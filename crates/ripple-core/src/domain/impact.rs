//! Impact report produced by the dependency mapper.

use std::collections::BTreeSet;

use ripple_state::RepoId;
use serde::{Deserialize, Serialize};

/// Identifier of a module inside a repository (e.g. `api`, `schema/billing`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePath(String);

impl ModulePath {
    pub fn new(path: impl Into<String>) -> Self {
        ModulePath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModulePath {
    fn from(s: &str) -> Self {
        ModulePath(s.to_string())
    }
}

/// Identifier of a test target or test file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestPath(String);

impl TestPath {
    pub fn new(path: impl Into<String>) -> Self {
        TestPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestPath {
    fn from(s: &str) -> Self {
        TestPath(s.to_string())
    }
}

/// Modules, tests and repositories plausibly affected by a change.
///
/// `impacted_repos` never contains the repository the change came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub changed_modules: BTreeSet<ModulePath>,
    pub impacted_tests: BTreeSet<TestPath>,
    pub impacted_repos: BTreeSet<RepoId>,
}

impl ImpactReport {
    pub fn is_empty(&self) -> bool {
        self.changed_modules.is_empty()
            && self.impacted_tests.is_empty()
            && self.impacted_repos.is_empty()
    }

    /// Plain-text summary; this section is never truncated in a context.
    pub fn render_summary(&self) -> String {
        fn line<T: std::fmt::Display>(label: &str, items: &BTreeSet<T>) -> String {
            if items.is_empty() {
                format!("{}: none\n", label)
            } else {
                let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
                format!("{}: {}\n", label, joined.join(", "))
            }
        }

        let mut out = String::from("## Impact\n");
        out.push_str(&line("Changed modules", &self.changed_modules));
        out.push_str(&line("Impacted tests", &self.impacted_tests));
        out.push_str(&line("Impacted repositories", &self.impacted_repos));
        out
    }
}
