//! Test utilities and common setup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use askrelay::api::{self, AppState};
use askrelay::history::HistoryConfig;
use askrelay::upstream::{Operation, UpstreamApi, UpstreamError, UpstreamResult};
use async_trait::async_trait;
use axum::Router;
use serde_json::{Value, json};

/// In-process upstream with one scripted reply per operation.
#[derive(Default)]
pub struct ScriptedUpstream {
    replies: Mutex<HashMap<Operation, UpstreamResult<Value>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(Operation, Option<Value>)>>,
}

impl ScriptedUpstream {
    /// A backend that is ready and answers every query with `response`.
    pub fn answering(response: &str) -> Arc<Self> {
        let upstream = Self::default();
        upstream.reply(Operation::Query, json!({"response": response}));
        upstream.reply(
            Operation::Status,
            json!({"ready": true, "error": null, "model": "test-model"}),
        );
        upstream.reply(Operation::Feedback, json!({"status": "success"}));
        upstream.reply(Operation::Metrics, json!({"total_queries": 3}));
        Arc::new(upstream)
    }

    /// A backend that cannot be reached for any operation.
    pub fn unreachable() -> Arc<Self> {
        let upstream = Self::default();
        for op in [
            Operation::Query,
            Operation::Status,
            Operation::Feedback,
            Operation::Metrics,
        ] {
            upstream.fail(
                op,
                UpstreamError::unreachable(
                    format!("http://upstream.invalid/{}", op.path()),
                    op.method().as_str(),
                    "connection refused",
                ),
            );
        }
        Arc::new(upstream)
    }

    pub fn reply(&self, op: Operation, value: Value) {
        self.replies.lock().unwrap().insert(op, Ok(value));
    }

    pub fn fail(&self, op: Operation, err: UpstreamError) {
        self.replies.lock().unwrap().insert(op, Err(err));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(Operation, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamApi for ScriptedUpstream {
    async fn call(&self, operation: Operation, payload: Option<Value>) -> UpstreamResult<Value> {
        self.calls.lock().unwrap().push((operation, payload));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// Application state backed by the given upstream.
pub fn test_state(upstream: Arc<ScriptedUpstream>) -> AppState {
    AppState::new(upstream, &HistoryConfig::default())
}

/// Create a test application backed by the given upstream.
pub fn test_app(upstream: Arc<ScriptedUpstream>) -> Router {
    api::create_router(test_state(upstream))
}

/// Serve `router` on an ephemeral local port and return its address.
pub async fn spawn_server(router: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
