//! Dependency mapper: change set → impact report.

use std::collections::BTreeSet;
use std::sync::Arc;

use ripple_state::{RelationshipKind, RelationshipStore, RepoId};
use tracing::{debug, instrument, trace};

use super::rules::{ModuleClassifier, VisibilityPolicy};
use super::test_index::TestIndex;
use crate::domain::{ChangeSet, ImpactReport, PipelineResult};

/// Walks the relationship graph for the modules a change set touches.
pub struct DependencyMapper {
    store: Arc<dyn RelationshipStore>,
    classifier: ModuleClassifier,
    policy: VisibilityPolicy,
    tests: Arc<dyn TestIndex>,
    follow_outgoing: bool,
}

impl DependencyMapper {
    pub fn new(
        store: Arc<dyn RelationshipStore>,
        classifier: ModuleClassifier,
        tests: Arc<dyn TestIndex>,
    ) -> Self {
        Self {
            store,
            classifier,
            policy: VisibilityPolicy::default(),
            tests,
            follow_outgoing: true,
        }
    }

    pub fn with_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// When false, only relationships that target the changed repo count.
    pub fn with_follow_outgoing(mut self, follow: bool) -> Self {
        self.follow_outgoing = follow;
        self
    }

    #[instrument(skip(self, change_set), fields(repo = %repo, files = change_set.len()))]
    pub async fn map(&self, repo: &RepoId, change_set: &ChangeSet) -> PipelineResult<ImpactReport> {
        let mut report = ImpactReport::default();
        if change_set.is_empty() {
            return Ok(report);
        }

        let mut allowed: BTreeSet<RelationshipKind> = BTreeSet::new();
        for file in change_set.files() {
            let Some(rule) = self.classifier.classify(&file.path) else {
                trace!(path = %file.path, "no module rule");
                continue;
            };
            report.changed_modules.insert(rule.module_id());
            allowed.extend(self.policy.allowed(rule.visibility));
        }

        for module in &report.changed_modules {
            report.impacted_tests.extend(self.tests.lookup(module));
        }

        if allowed.is_empty() {
            debug!(modules = report.changed_modules.len(), "no externally visible module touched");
            return Ok(report);
        }

        for rel in self.store.incoming(repo).await? {
            if allowed.contains(&rel.kind) {
                report.impacted_repos.insert(rel.source);
            }
        }
        if self.follow_outgoing {
            for rel in self.store.outgoing(repo).await? {
                if allowed.contains(&rel.kind) {
                    report.impacted_repos.insert(rel.target);
                }
            }
        }
        report.impacted_repos.remove(repo);

        debug!(
            modules = report.changed_modules.len(),
            tests = report.impacted_tests.len(),
            repos = report.impacted_repos.len(),
            "impact mapped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use ripple_state::fakes::MemoryRelationshipStore;
    use ripple_state::{Relationship, StorageError, StorageResult};

    use super::*;
    use crate::domain::{ChangeKind, ChangedFile, ModulePath};
    use crate::impact::rules::{ModuleRule, Visibility};
    use crate::impact::test_index::StaticTestIndex;

    /// Store that fails every call; proves the mapper did not touch it.
    struct UnreachableStore;

    #[async_trait]
    impl RelationshipStore for UnreachableStore {
        async fn add(
            &self,
            _: &RepoId,
            _: &RepoId,
            _: RelationshipKind,
            _: BTreeMap<String, String>,
        ) -> StorageResult<Relationship> {
            Err(StorageError::Backend("unreachable".into()))
        }
        async fn remove(&self, _: &RepoId, _: &RepoId, _: RelationshipKind) -> StorageResult<bool> {
            Err(StorageError::Backend("unreachable".into()))
        }
        async fn outgoing(&self, _: &RepoId) -> StorageResult<Vec<Relationship>> {
            Err(StorageError::Backend("unreachable".into()))
        }
        async fn incoming(&self, _: &RepoId) -> StorageResult<Vec<Relationship>> {
            Err(StorageError::Backend("unreachable".into()))
        }
        async fn list(&self) -> StorageResult<Vec<Relationship>> {
            Err(StorageError::Backend("unreachable".into()))
        }
    }

    /// Store that answers every read with a self-edge on the queried repo
    /// plus one edge to `org/peer`.
    struct LoopbackStore;

    fn edge(source: &RepoId, target: &RepoId) -> Relationship {
        Relationship {
            source: source.clone(),
            target: target.clone(),
            kind: RelationshipKind::ConsumerOfApi,
            metadata: BTreeMap::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[async_trait]
    impl RelationshipStore for LoopbackStore {
        async fn add(
            &self,
            _: &RepoId,
            _: &RepoId,
            _: RelationshipKind,
            _: BTreeMap<String, String>,
        ) -> StorageResult<Relationship> {
            Err(StorageError::Backend("read only".into()))
        }
        async fn remove(&self, _: &RepoId, _: &RepoId, _: RelationshipKind) -> StorageResult<bool> {
            Ok(false)
        }
        async fn outgoing(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
            Ok(vec![edge(repo, repo), edge(repo, &RepoId::from("org/peer"))])
        }
        async fn incoming(&self, repo: &RepoId) -> StorageResult<Vec<Relationship>> {
            Ok(vec![edge(repo, repo), edge(&RepoId::from("org/peer"), repo)])
        }
        async fn list(&self) -> StorageResult<Vec<Relationship>> {
            Ok(Vec::new())
        }
    }

    fn classifier() -> ModuleClassifier {
        ModuleClassifier::new(vec![
            ModuleRule::new("src/", Visibility::Internal),
            ModuleRule::new("api/", Visibility::ApiContract),
        ])
    }

    #[tokio::test]
    async fn test_internal_change_never_queries_store() {
        let mut index = StaticTestIndex::new();
        index.insert(ModulePath::from("src"), [crate::domain::TestPath::from("tests/unit.rs")]);
        let mapper =
            DependencyMapper::new(Arc::new(UnreachableStore), classifier(), Arc::new(index));

        let set = ChangeSet::new(vec![ChangedFile::new("src/lib.rs", ChangeKind::Modified)]);
        let report = mapper.map(&RepoId::from("org/a"), &set).await.unwrap();
        assert_eq!(report.changed_modules.len(), 1);
        assert_eq!(report.impacted_tests.len(), 1);
        assert!(report.impacted_repos.is_empty());
    }

    #[tokio::test]
    async fn test_empty_change_set_is_empty_report() {
        let mapper = DependencyMapper::new(
            Arc::new(UnreachableStore),
            classifier(),
            Arc::new(StaticTestIndex::new()),
        );
        let report = mapper
            .map(&RepoId::from("org/a"), &ChangeSet::empty())
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_storage_error() {
        let mapper = DependencyMapper::new(
            Arc::new(UnreachableStore),
            classifier(),
            Arc::new(StaticTestIndex::new()),
        );
        let set = ChangeSet::new(vec![ChangedFile::new("api/v1.yaml", ChangeKind::Modified)]);
        let err = mapper.map(&RepoId::from("org/a"), &set).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_kind_filter_applies() {
        let store = Arc::new(MemoryRelationshipStore::new());
        let a = RepoId::from("org/a");
        store
            .add(
                &RepoId::from("org/consumer"),
                &a,
                RelationshipKind::ConsumerOfApi,
                BTreeMap::new(),
            )
            .await
            .unwrap();
        store
            .add(&RepoId::from("org/sibling"), &a, RelationshipKind::SameDomain, BTreeMap::new())
            .await
            .unwrap();

        let mapper = DependencyMapper::new(store, classifier(), Arc::new(StaticTestIndex::new()));
        let set = ChangeSet::new(vec![ChangedFile::new("api/v1.yaml", ChangeKind::Modified)]);
        let report = mapper.map(&a, &set).await.unwrap();

        assert_eq!(
            report.impacted_repos.into_iter().collect::<Vec<_>>(),
            vec![RepoId::from("org/consumer")]
        );
    }

    #[tokio::test]
    async fn test_changed_repo_never_impacts_itself() {
        let a = RepoId::from("org/a");
        let set = ChangeSet::new(vec![ChangedFile::new("api/v1.yaml", ChangeKind::Modified)]);

        for follow_outgoing in [true, false] {
            let mapper = DependencyMapper::new(
                Arc::new(LoopbackStore),
                classifier(),
                Arc::new(StaticTestIndex::new()),
            )
            .with_follow_outgoing(follow_outgoing);
            let report = mapper.map(&a, &set).await.unwrap();

            assert!(!report.impacted_repos.contains(&a));
            assert_eq!(
                report.impacted_repos.into_iter().collect::<Vec<_>>(),
                vec![RepoId::from("org/peer")]
            );
        }
    }
}
