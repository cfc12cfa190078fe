//! Upstream client tests against a real local HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use askrelay::protocol::QueryType;
use askrelay::upstream::{
    FeedbackRequest, QueryRequest, UpstreamApi, UpstreamClient, UpstreamConfig, UpstreamErrorKind,
};
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};

mod common;
use common::spawn_server;

#[derive(Default)]
struct Seen {
    auth: Vec<Option<String>>,
    bodies: Vec<Value>,
}

fn client_for(base_url: String, api_key: Option<&str>) -> UpstreamClient {
    UpstreamClient::new(&UpstreamConfig {
        base_url,
        api_key: api_key.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
}

/// A backend that records what it receives and answers like the real one.
async fn recording_backend() -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));

    let query_seen = seen.clone();
    let status_seen = seen.clone();
    let router = Router::new()
        .route(
            "/query",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = query_seen.clone();
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.auth.push(auth_header(&headers));
                    let answer = format!("echo: {}", body["query"].as_str().unwrap_or_default());
                    seen.bodies.push(body);
                    Json(json!({"response": answer, "sources": []}))
                }
            }),
        )
        .route(
            "/status",
            get(move |headers: HeaderMap| {
                let seen = status_seen.clone();
                async move {
                    seen.lock().unwrap().auth.push(auth_header(&headers));
                    Json(json!({"ready": true, "error": null, "model": "llama"}))
                }
            }),
        )
        .route(
            "/feedback",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"status": "success", "rating": body["rating"]}))
            }),
        )
        .route("/metrics", get(|| async { "not json" }));

    let addr = spawn_server(router).await;
    (format!("http://{addr}/"), seen)
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_query_round_trip_with_bearer() {
    let (base_url, seen) = recording_backend().await;
    let client = client_for(base_url, Some("s3cret"));

    let response = client
        .query(&QueryRequest {
            query: "hello".into(),
            query_type: QueryType::Complete,
            client_id: Some("A".into()),
        })
        .await
        .unwrap();
    assert_eq!(response.response, "echo: hello");
    assert_eq!(response.extra["sources"], json!([]));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.auth, vec![Some("Bearer s3cret".to_string())]);
    assert_eq!(
        seen.bodies[0],
        json!({"query": "hello", "type": "complete", "client_id": "A"})
    );
}

#[tokio::test]
async fn test_blank_api_key_sends_no_auth() {
    let (base_url, seen) = recording_backend().await;
    let client = client_for(base_url, Some(""));

    let status = client.status().await.unwrap();
    assert!(status.ready);
    assert_eq!(status.model.as_deref(), Some("llama"));
    assert_eq!(seen.lock().unwrap().auth, vec![None]);
}

#[tokio::test]
async fn test_feedback_posts_body() {
    let (base_url, _seen) = recording_backend().await;
    let client = client_for(base_url, None);

    let ack = client
        .feedback(&FeedbackRequest {
            query_id: "q".into(),
            rating: 5,
            feedback_text: None,
        })
        .await
        .unwrap();
    assert_eq!(ack, json!({"status": "success", "rating": 5}));
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let (base_url, _seen) = recording_backend().await;
    let client = client_for(base_url, None);

    let err = client.metrics().await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::InvalidResponse);
    assert_eq!(err.status_code, Some(200));
    assert_eq!(err.response_text.as_deref(), Some("not json"));
    assert!(err.url.ends_with("/metrics"));
}

#[tokio::test]
async fn test_wrong_shape_error_carries_full_url() {
    let router = Router::new().route(
        "/status",
        get(|| async { Json(json!({"ready": "yes", "model": 7})) }),
    );
    let addr = spawn_server(router).await;
    let client = client_for(format!("http://{addr}/"), None);

    let err = client.status().await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::InvalidResponse);
    assert_eq!(err.method, "GET");
    assert_eq!(err.url, format!("http://{addr}/status"));
    assert!(err.to_string().ends_with(&format!("(GET http://{addr}/status)")));
}

#[tokio::test]
async fn test_error_status_is_rejected_with_body() {
    let router = Router::new().route(
        "/query",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let addr = spawn_server(router).await;
    let client = client_for(format!("http://{addr}"), None);

    let err = client
        .query(&QueryRequest {
            query: "x".into(),
            query_type: QueryType::Standard,
            client_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Rejected);
    assert_eq!(err.status_code, Some(500));
    assert_eq!(err.response_text.as_deref(), Some("model crashed"));
    assert_eq!(err.method, "POST");
    assert_eq!(err.url, format!("http://{addr}/query"));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let router = Router::new().route(
        "/query",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"response": "too late"}))
        }),
    );
    let addr = spawn_server(router).await;
    let client = client_for(format!("http://{addr}"), None)
        .with_query_timeout(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = client
        .query(&QueryRequest {
            query: "x".into(),
            query_type: QueryType::Standard,
            client_id: None,
        })
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(err.kind, UpstreamErrorKind::Unreachable);
    assert!(err.is_timeout());
    assert!(err.message.contains("timed out"));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{addr}"), None);
    let err = client.status().await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Unreachable);
    assert!(!err.is_timeout());
    assert_eq!(err.method, "GET");
    assert_eq!(err.url, format!("http://{addr}/status"));
}
