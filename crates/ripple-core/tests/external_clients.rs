//! HTTP-level tests for the reasoning backend and the GitHub comment host.
//!
//! A mockito server stands in for both services.

use std::sync::Arc;

use ripple_core::{
    AnalysisContext, BackendError, CommentHost, GitHubCommentHost, GitHubSettings, HostError,
    HttpReasoningBackend, PipelineError, ReasoningBackend, ReasoningClient, ReasoningSettings,
    RepoId, RetryPolicy, RiskLevel,
};

const ANALYSIS_JSON: &str =
    r#"{"summary":"Breaks the billing API","recommendations":["Bump org/web"],"risk_level":"high"}"#;

fn context() -> AnalysisContext {
    AnalysisContext {
        diff_summary: "## Diff\n### api/billing.rs [modified] (+1/-1)\n".into(),
        impact_summary: "## Impact\nImpacted repositories: org/web\n".into(),
        prior_context: None,
        budget: 1024,
    }
}

fn reasoning_backend(url: String) -> HttpReasoningBackend {
    HttpReasoningBackend::from_settings(&ReasoningSettings {
        url,
        api_key: Some("sk-test".into()),
        timeout_secs: 5,
        ..ReasoningSettings::default()
    })
    .unwrap()
}

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_reasoning_backend_returns_message_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(ANALYSIS_JSON))
        .create_async()
        .await;

    let backend = reasoning_backend(format!("{}/v1/chat/completions", server.url()));
    let raw = backend.complete(&context()).await.unwrap();
    assert_eq!(raw, ANALYSIS_JSON);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_reasoning_backend_status_mapping() {
    let cases: [(usize, fn(&BackendError) -> bool); 4] = [
        (429, |e| matches!(e, BackendError::RateLimited)),
        (503, |e| matches!(e, BackendError::Server { status: 503 })),
        (408, |e| matches!(e, BackendError::Timeout)),
        (401, |e| matches!(e, BackendError::Rejected { status: 401, .. })),
    ];

    for (status, check) in cases {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(status)
            .with_body("nope")
            .create_async()
            .await;

        let backend = reasoning_backend(format!("{}/chat", server.url()));
        let err = backend.complete(&context()).await.unwrap_err();
        assert!(check(&err), "status {status} mapped to {err:?}");
    }
}

#[tokio::test]
async fn test_reasoning_backend_without_choices_is_invalid_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[]}"#)
        .create_async()
        .await;

    let backend = reasoning_backend(format!("{}/chat", server.url()));
    let err = backend.complete(&context()).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidBody(_)));
}

#[tokio::test]
async fn test_permanent_rejection_is_attempted_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat")
        .with_status(400)
        .with_body(r#"{"error":"bad request"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = ReasoningClient::new(Arc::new(reasoning_backend(format!("{}/chat", server.url()))))
        .with_policy(RetryPolicy::new(3, 1));
    let err = client.analyze(&context()).await.unwrap_err();

    assert!(matches!(err, PipelineError::PermanentRequest(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_parses_fenced_reply_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(&format!("Here you go:\n```json\n{}\n```", ANALYSIS_JSON)))
        .create_async()
        .await;

    let backend = reasoning_backend(format!("{}/chat", server.url()));
    let client = ReasoningClient::new(Arc::new(backend));
    let result = client.analyze(&context()).await.unwrap();
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.recommendations, vec!["Bump org/web".to_string()]);
}

fn github_host(api_base: String) -> GitHubCommentHost {
    GitHubCommentHost::from_settings(&GitHubSettings {
        api_base,
        token: Some("ghp_test".into()),
        timeout_secs: 5,
        ..GitHubSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_github_host_posts_comment() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/org/api/issues/42/comments")
        .match_header("authorization", "Bearer ghp_test")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({ "body": "hello" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 9001, "html_url": "https://github.com/org/api/pull/42#issuecomment-9001"}"#)
        .create_async()
        .await;

    let host = github_host(server.url());
    let posted = host
        .post_comment(&RepoId::from("org/api"), 42, "hello")
        .await
        .unwrap();

    assert_eq!(posted.id, 9001);
    assert!(posted.url.unwrap().ends_with("issuecomment-9001"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_github_host_status_mapping() {
    let cases: [(usize, fn(&HostError) -> bool); 4] = [
        (403, |e| matches!(e, HostError::PermissionDenied { status: 403, .. })),
        (404, |e| matches!(e, HostError::PermissionDenied { status: 404, .. })),
        (502, |e| e.is_retryable()),
        (422, |e| matches!(e, HostError::Rejected { status: 422, .. })),
    ];

    for (status, check) in cases {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/org/api/issues/1/comments")
            .with_status(status)
            .with_body(r#"{"message":"nope"}"#)
            .create_async()
            .await;

        let err = github_host(server.url())
            .post_comment(&RepoId::from("org/api"), 1, "x")
            .await
            .unwrap_err();
        assert!(check(&err), "status {status} mapped to {err:?}");
    }
}

#[tokio::test]
async fn test_github_host_unreadable_reply() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/repos/org/api/issues/1/comments")
        .with_status(201)
        .with_body("not json")
        .create_async()
        .await;

    let err = github_host(server.url())
        .post_comment(&RepoId::from("org/api"), 1, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::InvalidResponse(_)));
}
