//! Module → test lookup.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{ModulePath, TestPath};

/// Source of the tests that cover a module.
pub trait TestIndex: Send + Sync {
    fn lookup(&self, module: &ModulePath) -> BTreeSet<TestPath>;
}

/// Fixed index, usually loaded from the `[impact.tests]` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticTestIndex {
    entries: BTreeMap<ModulePath, BTreeSet<TestPath>>,
}

impl StaticTestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        module: impl Into<ModulePath>,
        tests: impl IntoIterator<Item = TestPath>,
    ) {
        self.entries.entry(module.into()).or_default().extend(tests);
    }

    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut index = Self::new();
        for (module, tests) in map {
            index.insert(
                ModulePath::new(module.clone()),
                tests.iter().map(|t| TestPath::new(t.clone())),
            );
        }
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TestIndex for StaticTestIndex {
    fn lookup(&self, module: &ModulePath) -> BTreeSet<TestPath> {
        self.entries.get(module).cloned().unwrap_or_default()
    }
}
