// Integration tests for the POST /v1/events stream

use axum::{
    body::Body,
    http::{Request, StatusCode, Version},
    Router,
};
use futures::StreamExt;
use lookout::api::{create_router, AppState};
use lookout::config::LookoutConfig;
use lookout::process::ProcessControl;
use lookout::value::{decode, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::ServiceExt;

const CONFIG: &str = r#"
    [[hosts]]
    name = "web-01"

    [[services]]
    host = "web-01"
    name = "http"
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

fn check_result(exit_status: u32, output: &str) -> Request<Body> {
    post(
        "/v1/actions/process-check-result",
        &format!(
            r#"{{"type": "Service", "service": "web-01!http", "exit_status": {}, "plugin_output": "{}"}}"#,
            exit_status, output
        ),
    )
}

#[tokio::test]
async fn test_http10_rejected() {
    let (app, state) = create_test_app(CONFIG);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/events?queue=q1&types=CheckResult")
        .version(Version::HTTP_10)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.get("status"),
        Some(&Value::from("HTTP/1.0 not supported for event streams."))
    );
    assert!(state.queues.is_empty());
}

#[tokio::test]
async fn test_missing_queue_rejected() {
    let (app, state) = create_test_app(CONFIG);

    let (status, body) = send(&app, post("/v1/events", r#"{"types": ["CheckResult"]}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.get("status"),
        Some(&Value::from("'queue' attribute is required."))
    );
    assert!(state.queues.is_empty());
}

#[tokio::test]
async fn test_missing_types_rejected() {
    let (app, _) = create_test_app(CONFIG);

    let (status, _) = send(&app, post("/v1/events", r#"{"queue": "q1"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_event_type_rejected() {
    let (app, state) = create_test_app(CONFIG);

    let (status, body) = send(
        &app,
        post("/v1/events", r#"{"queue": "q1", "types": ["Bogus"]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.get("status"),
        Some(&Value::from("Invalid event type 'Bogus'."))
    );
    assert!(state.queues.is_empty());
}

#[tokio::test]
async fn test_event_permissions_enforced() {
    let config = r#"
        [[api_users]]
        name = "watcher"
        token = "watcher-token"
        permissions = ["events/CheckResult"]
    "#;
    let (app, state) = create_test_app(config);

    let (status, _) = send(
        &app,
        post("/v1/events", r#"{"queue": "q1", "types": ["CheckResult"]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post(
        "/v1/events",
        r#"{"queue": "q1", "types": ["CheckResult", "StateChange"]}"#,
    );
    request
        .headers_mut()
        .insert("authorization", "Bearer watcher-token".parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body.get("status"),
        Some(&Value::from("No permission for 'events/StateChange'."))
    );
    assert!(state.queues.is_empty());
}

/// A subscribed client receives one newline-terminated record per event.
#[tokio::test]
async fn test_stream_delivers_check_results() {
    let (app, state) = create_test_app(CONFIG);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "q1", "types": ["CheckResult", "StateChange"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(state.queues.len(), 1);

    let (status, _) = send(&app, check_result(2, "HTTP CRITICAL")).await;
    assert_eq!(status, StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let mut received = Vec::new();
    while received.len() < 2 {
        let chunk = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("event not delivered in time")
            .expect("stream ended early")
            .unwrap();
        assert!(chunk.ends_with(b"\n"));
        let text = std::str::from_utf8(&chunk).unwrap();
        for line in text.lines() {
            received.push(decode(line.as_bytes()).unwrap());
        }
    }

    // The check result is reported before the state change it causes.
    assert_eq!(received[0].get("type"), Some(&Value::from("CheckResult")));
    assert_eq!(received[0].get("host"), Some(&Value::from("web-01")));
    assert_eq!(received[0].get("service"), Some(&Value::from("http")));
    assert_eq!(received[1].get("type"), Some(&Value::from("StateChange")));
    assert_eq!(received[1].get("state"), Some(&Value::from(2)));
}

/// A queue filter hides events that do not match it.
#[tokio::test]
async fn test_stream_applies_filter() {
    let config = r#"
        [[hosts]]
        name = "web-01"

        [[hosts]]
        name = "db-01"
    "#;
    let (app, _) = create_test_app(config);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "db", "types": ["CheckResult"], "filter": {"host": "db-01"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for host in ["web-01", "db-01"] {
        let body = format!(
            r#"{{"type": "Host", "host": "{}", "exit_status": 0, "plugin_output": "UP"}}"#,
            host
        );
        let (status, _) = send(&app, post("/v1/actions/process-check-result", &body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let mut stream = response.into_body().into_data_stream();
    let chunk = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("event not delivered in time")
        .expect("stream ended early")
        .unwrap();
    let event = decode(&chunk).unwrap();
    assert_eq!(event.get("host"), Some(&Value::from("db-01")));
}

/// Dropping the response body detaches the subscriber and, with no TTL,
/// removes the queue.
#[tokio::test]
async fn test_client_disconnect_removes_queue() {
    let (app, state) = create_test_app(CONFIG);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "gone", "types": ["CheckResult"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.queues.get("gone").is_some());

    drop(response);
    assert!(state.queues.get("gone").is_none());
}

/// A queue with a TTL outlives its last subscriber.
#[tokio::test]
async fn test_queue_with_ttl_survives_disconnect() {
    let (app, state) = create_test_app(CONFIG);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "kept", "types": ["CheckResult"], "ttl": 60}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    drop(response);
    let queue = state.queues.get("kept").unwrap();
    assert_eq!(queue.subscriber_count(), 0);
}

/// A shutdown request ends open streams.
#[tokio::test]
async fn test_shutdown_ends_stream() {
    let (app, _) = create_test_app(CONFIG);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "q1", "types": ["CheckResult"]}"#,
        ))
        .await
        .unwrap();

    let (status, _) = send(&app, post("/v1/actions/shutdown-process", "")).await;
    assert_eq!(status, StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let next = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream did not end in time");
    assert!(next.is_none());
}

#[tokio::test]
async fn test_status_lists_queues() {
    let (app, _) = create_test_app(CONFIG);

    let _stream = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"queue": "ops", "types": ["StateChange", "CheckResult"]}"#,
        ))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/v1/status")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let queues = body.get("queues").and_then(|q| q.as_list()).unwrap();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].get("name"), Some(&Value::from("ops")));
    assert_eq!(queues[0].get("subscribers"), Some(&Value::from(1)));
    assert_eq!(
        queues[0].get("types"),
        Some(&Value::List(vec![
            Value::from("CheckResult"),
            Value::from("StateChange"),
        ]))
    );
}
