#![cfg(unix)]
#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! HTTP routes end to end, with a fake agent behind the executor.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use ghostrun_core::Config;
use ghostrun_core::config::ExecutorConfig;
use ghostrun_server::executor::Executor;
use ghostrun_server::server::{AppState, build_router};

use common::{FakeAgent, RESULT_DONE, SYSTEM_S1, TEXT_HELLO};

fn app(agent: &FakeAgent) -> axum::Router {
    app_with(agent, |_| {})
}

fn app_with(agent: &FakeAgent, customize: impl FnOnce(&mut Config)) -> axum::Router {
    let mut config = Config {
        executor: ExecutorConfig {
            claude_bin: agent.bin.clone(),
            timeout_secs: 30,
            ..ExecutorConfig::default()
        },
        ..Config::default()
    };
    customize(&mut config);
    let executor = Executor::new(&config.executor);
    build_router(AppState::new(config, executor))
}

/// Send a request and return (status, headers' content type, body text).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, String, String) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (
        status,
        content_type,
        String::from_utf8_lossy(&bytes).into_owned(),
    )
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, _, text) = send(app, "POST", uri, Some(body)).await;
    (status, serde_json::from_str(&text).unwrap())
}

fn project(agent: &FakeAgent) -> String {
    agent.project.to_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let agent = FakeAgent::new("exit 0");
    let (status, _, text) = send(app(&agent), "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&text).unwrap(),
        json!({"status": "ok"})
    );
}

#[tokio::test]
async fn relative_project_is_rejected() {
    let agent = FakeAgent::new("exit 0");
    let (status, body) = post_json(
        app(&agent),
        "/api/command",
        json!({"project": "relative", "command": "plan", "args": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "project must be an absolute path");
}

#[tokio::test]
async fn unlisted_command_is_rejected_before_launch() {
    // The agent would leave a marker file if it ever ran.
    let agent = FakeAgent::new("touch ran");
    let (status, body) = post_json(
        app(&agent),
        "/api/command",
        json!({"project": project(&agent), "command": "deploy", "args": "prod"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Command not allowed: deploy");
    assert!(!agent.project.join("ran").exists());
}

#[tokio::test]
async fn missing_args_and_answer_are_rejected() {
    let agent = FakeAgent::new("exit 0");
    let (status, body) = post_json(
        app(&agent),
        "/api/command/stream",
        json!({"project": project(&agent), "command": "plan", "args": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "args is required");

    let (status, body) = post_json(
        app(&agent),
        "/api/command/continue",
        json!({"project": project(&agent), "session_id": "s1", "answer": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "answer is required");
}

#[tokio::test]
async fn invalid_json_gets_a_json_error() {
    let agent = FakeAgent::new("exit 0");
    let req = Request::builder()
        .method("POST")
        .uri("/api/command")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app(&agent).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request")
    );
}

#[tokio::test]
async fn unsupported_image_is_rejected() {
    let agent = FakeAgent::new("exit 0");
    let (status, body) = post_json(
        app(&agent),
        "/api/command",
        json!({
            "project": project(&agent),
            "command": "plan",
            "args": "x",
            "images": [{"name": "a.bmp", "data": "AAAA", "mimeType": "image/bmp"}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image 1: unsupported format image/bmp");
}

#[tokio::test]
async fn sync_command_returns_the_result() {
    let agent = FakeAgent::printing(
        &[r#"{"type":"result","session_id":"s1","result":"planned","cost_usd":0.01}"#],
        "exit 0",
    );
    let (status, body) = post_json(
        app(&agent),
        "/api/command",
        json!({"project": project(&agent), "command": "plan", "args": "add login"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "session_id": "s1",
            "output": "planned",
            "completed": true,
            "cost_usd": 0.01
        })
    );
}

#[tokio::test]
async fn sync_failure_is_a_server_error_with_partial_output() {
    let agent = FakeAgent::new("echo 'halfway'\nexit 1");
    let (status, body) = post_json(
        app(&agent),
        "/api/plan",
        json!({"project": project(&agent), "args": "add login"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["output"].as_str().unwrap().trim(), "halfway");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Claude CLI execution failed: Command failed")
    );
}

#[tokio::test]
async fn prompt_lists_attached_images() {
    // Echo the prompt (second argument) back as the result text.
    let agent = FakeAgent::new(
        r#"printf '%s' "$2" > prompt.txt
printf '{"type":"result","session_id":"s1","result":"ok"}\n'"#,
    );
    let (status, _) = post_json(
        app(&agent),
        "/api/command",
        json!({
            "project": project(&agent),
            "command": "plan",
            "args": "from mockup",
            "images": [{"name": "a.png", "data": "iVBORw==", "mimeType": "image/png"}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let prompt = std::fs::read_to_string(agent.project.join("prompt.txt")).unwrap();
    let (head, images) = prompt.split_once("\n\nAttached images:\n").unwrap();
    assert_eq!(head, "/plan from mockup");
    let path = images.trim_end().strip_prefix("1. ").unwrap();
    assert!(path.ends_with(".png"), "{path}");
    // Removed once the execution finished
    assert!(!std::path::Path::new(path).exists());
}

#[tokio::test]
async fn stream_relays_events_as_sse() {
    let agent = FakeAgent::printing(&[SYSTEM_S1, TEXT_HELLO, RESULT_DONE], "exit 0");
    let (status, content_type, text) = send(
        app(&agent),
        "POST",
        "/api/command/stream",
        Some(json!({"project": project(&agent), "command": "plan", "args": "add login"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/event-stream");

    let events: Vec<Value> = text
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    let types: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["init", "init", "text", "complete"]);
    assert_eq!(events[3]["result"]["output"], "done");
}

#[tokio::test]
async fn continue_stream_resumes_the_session() {
    let agent = FakeAgent::new(
        r#"printf '{"type":"assistant","message":{"content":[{"type":"text","text":"%s"}]}}\n' "$*""#,
    );
    let (status, _, text) = send(
        app(&agent),
        "POST",
        "/api/plan/continue/stream",
        Some(json!({"project": project(&agent), "session_id": "s7", "answer": "Yes"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("--resume s7"), "{text}");
    assert!(text.contains(r#""type":"complete""#), "{text}");
}

#[tokio::test]
async fn cors_allows_configured_origins_only() {
    let agent = FakeAgent::new("exit 0");
    for (origin, allowed) in [
        ("http://localhost:3000", true),
        ("http://100.101.102.103:3000", true),
        ("https://box.tail123.ts.net", true),
        ("https://example.com", false),
    ] {
        let req = Request::builder()
            .uri("/api/health")
            .header("origin", origin)
            .body(Body::empty())
            .unwrap();
        let resp = app(&agent).oneshot(req).await.unwrap();
        let echoed = resp
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string());
        if allowed {
            assert_eq!(echoed.as_deref(), Some(origin));
        } else {
            assert_eq!(echoed, None, "{origin}");
        }
    }
}

#[tokio::test]
async fn projects_lists_visible_directories() {
    let agent = FakeAgent::new("exit 0");
    let root = agent.root().to_path_buf();
    std::fs::create_dir(root.join("alpha")).unwrap();
    std::fs::create_dir(root.join(".git")).unwrap();
    std::os::unix::fs::symlink(&agent.project, root.join("linked")).unwrap();

    let app = app_with(&agent, |config| {
        config.server.projects_dir = Some(root.clone());
    });
    let (status, _, text) = send(app, "GET", "/api/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        body,
        json!({
            "success": true,
            "projects": [
                {"name": "alpha", "path": root.join("alpha")},
                {"name": "project", "path": root.join("project")}
            ]
        })
    );
}

#[tokio::test]
async fn projects_with_missing_base_is_a_server_error() {
    let agent = FakeAgent::new("exit 0");
    let app = app_with(&agent, |config| {
        config.server.projects_dir = Some(agent.root().join("gone"));
    });
    let (status, _, text) = send(app, "GET", "/api/projects", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "failed to list projects");
}

#[tokio::test]
async fn files_lists_docs_by_folder() {
    let agent = FakeAgent::new("exit 0");
    let folder = agent.project.join("開発").join("検討中");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("idea.md"), "# idea").unwrap();
    std::fs::write(folder.join("sketch.png"), "").unwrap();

    let uri = format!("/api/files?project={}", project(&agent));
    let (status, _, text) = send(app(&agent), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["files"]["検討中"],
        json!([{"name": "idea.md", "path": "開発/検討中/idea.md"}])
    );
    assert_eq!(body["files"]["資料"], json!([]));
    assert_eq!(body["files"].as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn files_needs_an_existing_docs_dir() {
    let agent = FakeAgent::new("exit 0");
    let uri = format!("/api/files?project={}", project(&agent));
    let (status, _, text) = send(app(&agent), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "docs directory does not exist");

    let (status, _, text) = send(app(&agent), "GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "project is required");
}
