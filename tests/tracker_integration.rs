//! Integration tests for the GitHub client against a mock API server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use log_issue_monitor::tracker::{GitHubClient, IssueRef, IssueTracker, NewIssue, TrackerError};
use serde_json::{json, Value};

#[derive(Default)]
struct MockGitHub {
    issues: Mutex<Vec<Value>>,
    comments: Mutex<Vec<(u64, String)>>,
    queries: Mutex<Vec<String>>,
    auth: Mutex<Vec<String>>,
}

type Shared = Arc<MockGitHub>;

fn record_auth(state: &MockGitHub, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.auth.lock().unwrap().push(value.to_string());
    }
}

async fn create_issue(
    State(state): State<Shared>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    if body["title"].as_str().is_some_and(|t| t.contains("reject")) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Validation Failed" })),
        );
    }
    let mut issues = state.issues.lock().unwrap();
    issues.push(body);
    let number = issues.len();
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 1000 + number,
            "number": number,
            "html_url": format!("https://github.com/{owner}/{repo}/issues/{number}"),
            "state": "open",
        })),
    )
}

async fn search_issues(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let query = params.get("q").cloned().unwrap_or_default();
    state.queries.lock().unwrap().push(query.clone());
    let items = if query.contains("abcdef0123456789") {
        vec![json!({ "number": 42, "html_url": "https://github.com/acme/shop/issues/42" })]
    } else {
        Vec::new()
    };
    Json(json!({ "total_count": items.len(), "items": items }))
}

async fn add_comment(
    State(state): State<Shared>,
    Path((_owner, _repo, number)): Path<(String, String, u64)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let text = body["body"].as_str().unwrap_or_default().to_string();
    state.comments.lock().unwrap().push((number, text));
    StatusCode::CREATED
}

async fn current_user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer good-token") => (StatusCode::OK, Json(json!({ "login": "octocat" }))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Bad credentials" })),
        ),
    }
}

async fn spawn_mock() -> (String, Shared) {
    let state: Shared = Arc::new(MockGitHub::default());
    let router = Router::new()
        .route("/repos/:owner/:repo/issues", post(create_issue))
        .route(
            "/repos/:owner/:repo/issues/:number/comments",
            post(add_comment),
        )
        .route("/search/issues", get(search_issues))
        .route("/user", get(current_user))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (format!("http://{addr}"), state)
}

fn client(base: &str, token: &str) -> GitHubClient {
    GitHubClient::new(base, token, "acme", "shop", Duration::from_secs(5))
        .expect("Failed to build client")
}

fn issue(title: &str) -> NewIssue {
    NewIssue {
        title: title.to_string(),
        body: "## Error\n\nDatabase connection failed".to_string(),
        labels: vec!["bug".to_string(), "auto-generated".to_string()],
        assignees: vec!["octocat".to_string()],
    }
}

#[tokio::test]
async fn test_create_issue_posts_payload() {
    let (base, state) = spawn_mock().await;
    let github = client(&base, "good-token");

    let created = github
        .create_issue(&issue("[Auto] Database connection failed"))
        .await
        .unwrap();
    assert_eq!(created.number, 1);
    assert_eq!(created.html_url, "https://github.com/acme/shop/issues/1");

    let issues = state.issues.lock().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["title"], "[Auto] Database connection failed");
    assert_eq!(issues[0]["labels"], json!(["bug", "auto-generated"]));
    assert_eq!(issues[0]["assignees"], json!(["octocat"]));
    assert_eq!(*state.auth.lock().unwrap(), vec!["Bearer good-token"]);
}

#[tokio::test]
async fn test_create_issue_http_error() {
    let (base, _state) = spawn_mock().await;
    let github = client(&base, "good-token");

    let err = github.create_issue(&issue("please reject me")).await.unwrap_err();
    match err {
        TrackerError::Http { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("Validation Failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_find_open_issue_by_fingerprint() {
    let (base, state) = spawn_mock().await;
    let github = client(&base, "good-token");

    let found = github.find_open_issue("abcdef0123456789").await.unwrap();
    assert_eq!(
        found,
        Some(IssueRef {
            number: 42,
            html_url: "https://github.com/acme/shop/issues/42".to_string(),
        })
    );
    assert!(github.find_open_issue("0000000000000000").await.unwrap().is_none());

    let queries = state.queries.lock().unwrap();
    assert!(queries[0].contains("repo:acme/shop"));
    assert!(queries[0].contains("is:open"));
}

#[tokio::test]
async fn test_add_comment() {
    let (base, state) = spawn_mock().await;
    let github = client(&base, "good-token");
    let existing = IssueRef {
        number: 7,
        html_url: "https://github.com/acme/shop/issues/7".to_string(),
    };

    github.add_comment(&existing, "Occurred again").await.unwrap();
    assert_eq!(
        *state.comments.lock().unwrap(),
        vec![(7, "Occurred again".to_string())]
    );
}

#[tokio::test]
async fn test_connection_checks_credentials() {
    let (base, _state) = spawn_mock().await;
    assert!(client(&base, "good-token").test_connection().await);
    assert!(!client(&base, "bad-token").test_connection().await);
}

#[tokio::test]
async fn test_connection_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let github = client(&format!("http://{addr}"), "good-token");
    assert!(!github.test_connection().await);
    let err = github.create_issue(&issue("anything")).await.unwrap_err();
    assert!(matches!(err, TrackerError::RequestFailed(_)));
}
