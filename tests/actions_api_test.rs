// Integration tests for POST /v1/actions/:name and GET /v1/status

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lookout::api::{create_router, AppState};
use lookout::checkable::CheckableKind;
use lookout::config::LookoutConfig;
use lookout::process::{LifecycleRequest, ProcessControl};
use lookout::value::{decode, Value};
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"
    [[hosts]]
    name = "web-01"

    [[services]]
    host = "web-01"
    name = "http"

    [[services]]
    host = "web-01"
    name = "passive-off"
    enable_passive_checks = false
"#;

fn create_test_app(config: &str) -> (Router, Arc<AppState>) {
    let config: LookoutConfig = toml::from_str(config).unwrap();
    let state = Arc::new(AppState::from_config(&config, ProcessControl::new()));
    (create_router(Arc::clone(&state)), state)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, decode(&body).unwrap())
}

/// A passive check result is applied and reported with code 200.
#[tokio::test]
async fn test_process_check_result_for_service() {
    let (app, state) = create_test_app(CONFIG);

    let (status, result) = send(
        &app,
        post(
            "/v1/actions/process-check-result",
            r#"{"type": "Service", "host": "web-01", "service": "http",
                "exit_status": 2, "plugin_output": "HTTP CRITICAL"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result.get("code"), Some(&Value::from(200)));
    let svc = state
        .context
        .store
        .get(CheckableKind::Service, "web-01!http")
        .unwrap();
    assert_eq!(
        svc.snapshot().unwrap().last_check_result.unwrap().output,
        "HTTP CRITICAL"
    );
}

/// Validation failures surface as HTTP 403 with the result body.
#[tokio::test]
async fn test_passive_checks_disabled_returns_403() {
    let (app, _) = create_test_app(CONFIG);

    let (status, result) = send(
        &app,
        post(
            "/v1/actions/process_check_result",
            r#"{"type": "Service", "service": "web-01!passive-off",
                "exit_status": 0, "plugin_output": "OK"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(result.get("code"), Some(&Value::from(403)));
}

#[tokio::test]
async fn test_unknown_object_returns_404() {
    let (app, _) = create_test_app(CONFIG);

    let (status, result) = send(
        &app,
        post(
            "/v1/actions/acknowledge-problem",
            r#"{"type": "Host", "host": "nope", "author": "a", "comment": "c"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(result.get("status"), Some(&Value::from("No objects found.")));
}

#[tokio::test]
async fn test_unknown_action_returns_404() {
    let (app, _) = create_test_app(CONFIG);

    let (status, result) = send(&app, post("/v1/actions/launch-rockets", "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(result.get("code"), Some(&Value::from(404)));
}

#[tokio::test]
async fn test_typed_action_without_type_is_not_applicable() {
    let (app, _) = create_test_app(CONFIG);

    let (status, _) = send(
        &app,
        post("/v1/actions/add-comment", r#"{"author": "a", "comment": "c"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Query-string parameters are merged with the body.
#[tokio::test]
async fn test_query_parameters_are_accepted() {
    let (app, state) = create_test_app(CONFIG);

    let (status, result) = send(
        &app,
        post(
            "/v1/actions/add-comment?type=Host&host=web-01&author=alice",
            r#"{"comment": "disk replaced"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(result.get("legacy_id").is_some());
    let host = state.context.store.get(CheckableKind::Host, "web-01").unwrap();
    assert_eq!(host.snapshot().unwrap().comments.len(), 1);
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let (app, _) = create_test_app(CONFIG);

    let (status, body) = send(&app, post("/v1/actions/shutdown-process", "{")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("error"), Some(&Value::from(400)));
}

/// Pathologically nested bodies are refused instead of exhausting the stack.
#[tokio::test]
async fn test_deeply_nested_body_returns_400() {
    let (app, state) = create_test_app(CONFIG);

    let mut body = r#"{"x":"#.to_string();
    body.push_str(&"[".repeat(500_000));
    body.push_str(&"]".repeat(500_000));
    body.push('}');

    let (status, result) = send(&app, post("/v1/actions/shutdown_process", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(result.get("error"), Some(&Value::from(400)));
    assert_eq!(state.context.process.pending(), None);
}

#[tokio::test]
async fn test_shutdown_process_posts_request() {
    let (app, state) = create_test_app(CONFIG);

    let (status, _) = send(&app, post("/v1/actions/shutdown-process", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        state.context.process.pending(),
        Some(LifecycleRequest::Shutdown)
    );
}

#[tokio::test]
async fn test_modify_global_reflected_in_status() {
    let (app, _) = create_test_app(CONFIG);

    let (status, _) = send(
        &app,
        post(
            "/v1/actions/modify-global-notification-delivery",
            r#"{"active": false}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/v1/status")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.get("flags").and_then(|f| f.get("enable_notifications")),
        Some(&Value::from(false))
    );
    assert_eq!(body.get("objects"), Some(&Value::from(3)));
}

const AUTH_CONFIG: &str = r#"
    [[api_users]]
    name = "checker"
    token = "checker-token"
    permissions = ["actions/process-check-result"]

    [[hosts]]
    name = "web-01"
"#;

#[tokio::test]
async fn test_missing_token_returns_401() {
    let (app, _) = create_test_app(AUTH_CONFIG);

    let (status, body) = send(&app, post("/v1/actions/shutdown-process", "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.get("error"), Some(&Value::from(401)));
}

#[tokio::test]
async fn test_action_permissions_enforced() {
    let (app, state) = create_test_app(AUTH_CONFIG);

    let mut request = post("/v1/actions/shutdown-process", "");
    request
        .headers_mut()
        .insert("authorization", "Bearer checker-token".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(state.context.process.pending(), None);

    let mut request = post(
        "/v1/actions/process_check_result",
        r#"{"type": "Host", "host": "web-01", "exit_status": 1, "plugin_output": "DOWN"}"#,
    );
    request
        .headers_mut()
        .insert("authorization", "Bearer checker-token".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}
