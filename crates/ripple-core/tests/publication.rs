//! Publication idempotency over both receipt ledger backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ripple_core::{
    AnalysisResult, CommentHost, HostError, ImpactReport, PipelineError, PostedComment,
    PublicationClient, ReceiptLedger, RepoId, RetryPolicy, RiskLevel,
};
use ripple_state::fakes::MemoryReceiptLedger;
use ripple_state::{SurrealHandle, SurrealReceiptLedger};

#[derive(Default)]
struct CountingHost {
    posts: AtomicU64,
}

#[async_trait]
impl CommentHost for CountingHost {
    async fn post_comment(&self, _: &RepoId, _: u64, _: &str) -> Result<PostedComment, HostError> {
        tokio::task::yield_now().await;
        let id = self.posts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PostedComment { id, url: None })
    }
}

struct DeniedHost;

#[async_trait]
impl CommentHost for DeniedHost {
    async fn post_comment(&self, _: &RepoId, _: u64, _: &str) -> Result<PostedComment, HostError> {
        Err(HostError::from_status(403, "Resource not accessible by integration"))
    }
}

fn analysis() -> AnalysisResult {
    AnalysisResult {
        summary: "Shared schema changed".into(),
        recommendations: vec!["Regenerate clients".into()],
        risk_level: RiskLevel::Medium,
    }
}

async fn ledgers() -> Vec<Arc<dyn ReceiptLedger>> {
    let handle = SurrealHandle::in_memory().await.unwrap();
    vec![
        Arc::new(MemoryReceiptLedger::new()),
        Arc::new(SurrealReceiptLedger::new(handle)),
    ]
}

#[tokio::test]
async fn test_publishing_twice_posts_once() {
    for ledger in ledgers().await {
        let host = Arc::new(CountingHost::default());
        let client = PublicationClient::new(host.clone(), ledger);
        let repo = RepoId::from("org/api");

        let first = client.publish(&repo, 5, &analysis(), "d-1").await.unwrap();
        let second = client.publish(&repo, 5, &analysis(), "d-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(host.posts.load(Ordering::SeqCst), 1);
        assert_eq!(client.receipt("d-1").await.unwrap(), Some(first));
    }
}

#[tokio::test]
async fn test_concurrent_publishes_post_once() {
    for ledger in ledgers().await {
        let host = Arc::new(CountingHost::default());
        let client = Arc::new(PublicationClient::new(host.clone(), ledger));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    client
                        .publish_with_impact(
                            &RepoId::from("org/api"),
                            5,
                            &analysis(),
                            Some(&ImpactReport::default()),
                            "d-7",
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut comment_ids = Vec::new();
        for task in tasks {
            comment_ids.push(task.await.unwrap().comment_id);
        }
        comment_ids.dedup();
        assert_eq!(comment_ids, vec![1]);
        assert_eq!(host.posts.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_distinct_deliveries_post_separately() {
    let host = Arc::new(CountingHost::default());
    let client = PublicationClient::new(host.clone(), Arc::new(MemoryReceiptLedger::new()));
    let repo = RepoId::from("org/api");

    client.publish(&repo, 5, &analysis(), "d-1").await.unwrap();
    client.publish(&repo, 5, &analysis(), "d-2").await.unwrap();
    assert_eq!(host.posts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_permission_denied_is_permanent_and_unrecorded() {
    let ledger = Arc::new(MemoryReceiptLedger::new());
    let client = PublicationClient::new(Arc::new(DeniedHost), ledger.clone())
        .with_policy(RetryPolicy::new(3, 1));

    let err = client
        .publish(&RepoId::from("org/api"), 5, &analysis(), "d-1")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::PermanentRequest(_)));
    assert!(ledger.is_empty());
}
