//! Integration tests for POST /generate
//!
//! Drives the full Axum application with `oneshot` against wiremock backends:
//! explicit routing, unknown routes, unreachable backends, missing `text`,
//! request validation, and the metrics recorded for each case.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use prompt_router::{
    config::Config,
    handlers::{self, AppState},
    middleware::REQUEST_ID_HEADER,
    registry::TargetRegistry,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_state(endpoints: &str) -> AppState {
    let config: Config = toml::from_str(&format!(
        r#"
[server]
request_timeout_seconds = 5

[routing]
endpoints = "{}"
"#,
        endpoints
    ))
    .expect("should parse test config");
    config.validate().expect("test config should validate");

    AppState::new(Arc::new(config)).expect("should create AppState")
}

async fn post_generate(app: Router, body: Value) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, request_id, bytes.to_vec())
}

/// Bind an ephemeral port and release it so nothing is listening there
fn unreachable_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/generate", port)
}

async fn mount_text_backend(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": text })))
        .mount(server)
        .await;
}

/// Scenario A: explicit route to a healthy backend
#[tokio::test]
async fn test_explicit_route_returns_backend_text() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_json(json!({"prompt": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello"})))
        .expect(1)
        .mount(&backend_a)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "wrong"})))
        .expect(0)
        .mount(&backend_b)
        .await;

    let state = create_state(&format!(
        "v1={}/generate,v2={}/generate",
        backend_a.uri(),
        backend_b.uri()
    ));
    let metrics_state = state.clone();

    let (status, request_id, body) = post_generate(
        handlers::app(state),
        json!({"prompt": "hi", "version": "v1"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(request_id.is_some(), "response should carry x-request-id");

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["version"], "v1");
    assert_eq!(body["response"], "hello");
    let latency = body["latency_seconds"].as_f64().expect("latency is a number");
    assert!(latency >= 0.0);

    assert_eq!(metrics_state.metrics().request_count("v1"), 1);
    assert_eq!(metrics_state.metrics().latency_sample_count("v1"), 1);
    assert_eq!(metrics_state.metrics().request_count("v2"), 0);
}

/// Scenario B: explicit route that is not registered
#[tokio::test]
async fn test_unknown_route_is_client_error_without_fallback() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;
    for backend in [&backend_a, &backend_b] {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "x"})))
            .expect(0)
            .mount(backend)
            .await;
    }

    let state = create_state(&format!(
        "v1={}/generate,v2={}/generate",
        backend_a.uri(),
        backend_b.uri()
    ));
    let metrics_state = state.clone();

    let (status, _, body) = post_generate(
        handlers::app(state),
        json!({"prompt": "hi", "version": "v3"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("v3"), "error should name the route: {}", message);

    let output = metrics_state.metrics().gather().unwrap();
    assert!(
        !output.contains("version=\"v3\""),
        "no metric should be recorded for an unknown route"
    );
    assert!(!output.contains("prompt_router_requests_total{"));
}

/// Scenario C: the only backend is unreachable
#[tokio::test]
async fn test_unreachable_backend_is_server_error_and_counted() {
    let state = create_state(&format!("v1={}", unreachable_address()));
    let metrics_state = state.clone();

    let (status, _, body) = post_generate(handlers::app(state), json!({"prompt": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("v1"));

    assert_eq!(metrics_state.metrics().request_count("v1"), 1);
    assert_eq!(metrics_state.metrics().latency_sample_count("v1"), 1);
    assert_eq!(metrics_state.metrics().backend_failure_count("v1"), 1);
}

/// Scenario D: malformed entries in the route table are ignored
#[test]
fn test_malformed_route_entries_are_skipped() {
    let registry = TargetRegistry::parse("v1=http://a,malformed,v2=http://b");
    assert_eq!(registry.ids(), vec!["v1", "v2"]);
    assert_eq!(registry.resolve("v1").unwrap(), "http://a");
    assert_eq!(registry.resolve("v2").unwrap(), "http://b");
}

#[tokio::test]
async fn test_backend_reply_without_text_yields_null_response() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tokens": 3})))
        .mount(&backend)
        .await;

    let state = create_state(&format!("v1={}/generate", backend.uri()));
    let (status, _, body) = post_generate(handlers::app(state), json!({"prompt": "hi"})).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["version"], "v1");
    assert!(body["response"].is_null());
}

#[tokio::test]
async fn test_backend_error_status_is_bad_gateway() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&backend)
        .await;

    let state = create_state(&format!("v1={}/generate", backend.uri()));
    let metrics_state = state.clone();
    let (status, _, _) = post_generate(handlers::app(state), json!({"prompt": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(metrics_state.metrics().backend_failure_count("v1"), 1);
}

#[tokio::test]
async fn test_backend_malformed_body_is_bad_gateway() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&backend)
        .await;

    let state = create_state(&format!("v1={}/generate", backend.uri()));
    let (status, _, _) = post_generate(handlers::app(state), json!({"prompt": "hi"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_random_selection_only_hits_registered_backends() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;
    mount_text_backend(&backend_a, "from-a").await;
    mount_text_backend(&backend_b, "from-b").await;

    let state = create_state(&format!(
        "v1={}/generate,v2={}/generate",
        backend_a.uri(),
        backend_b.uri()
    ));

    for _ in 0..20 {
        let (status, _, body) =
            post_generate(handlers::app(state.clone()), json!({"prompt": "hi"})).await;
        assert_eq!(status, StatusCode::OK);

        let body: Value = serde_json::from_slice(&body).unwrap();
        match body["version"].as_str().unwrap() {
            "v1" => assert_eq!(body["response"], "from-a"),
            "v2" => assert_eq!(body["response"], "from-b"),
            other => panic!("unexpected route {}", other),
        }
    }

    let total = state.metrics().request_count("v1") + state.metrics().request_count("v2");
    assert_eq!(total, 20);
}

#[tokio::test]
async fn test_empty_version_falls_back_to_selection() {
    let backend = MockServer::start().await;
    mount_text_backend(&backend, "ok").await;

    let state = create_state(&format!("v1={}/generate", backend.uri()));
    let (status, _, body) = post_generate(
        handlers::app(state),
        json!({"prompt": "hi", "version": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["version"], "v1");
}

#[tokio::test]
async fn test_blank_prompt_is_rejected_with_json_error() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "x"})))
        .expect(0)
        .mount(&backend)
        .await;

    let state = create_state(&format!("v1={}/generate", backend.uri()));
    let (status, request_id, body) =
        post_generate(handlers::app(state), json!({"prompt": "   "})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(request_id.is_some());
    let body: Value = serde_json::from_slice(&body).expect("error body should be JSON");
    let message = body["error"].as_str().expect("error field is a string");
    assert!(message.contains("prompt"), "error: {}", message);
}

#[tokio::test]
async fn test_missing_prompt_is_rejected_with_json_error() {
    let state = create_state("v1=http://127.0.0.1:9/generate");
    let (status, _, body) = post_generate(handlers::app(state), json!({"version": "v1"})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body).expect("error body should be JSON");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request_with_json_error() {
    let state = create_state("v1=http://127.0.0.1:9/generate");
    let response = handlers::app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt": "hi""#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).expect("error body should be JSON");
    assert!(body["error"].is_string());
}
