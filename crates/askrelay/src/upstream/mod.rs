//! Upstream inference backend client.
//!
//! Every call is bounded by a per-operation timeout and every failure is
//! folded into an [`UpstreamError`] value, so callers decide per call whether
//! a failure matters to them.

mod client;
mod error;
mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use client::{UpstreamClient, UpstreamConfig};
pub use error::{UpstreamError, UpstreamErrorKind, UpstreamResult};
pub use types::*;

/// Upstream API abstraction, implemented by [`UpstreamClient`] and by test fakes.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Perform one operation using that operation's timeout budget.
    async fn call(&self, operation: Operation, payload: Option<Value>) -> UpstreamResult<Value>;

    /// Target URL of an operation, as reported in errors.
    fn target_url(&self, operation: Operation) -> String {
        operation.path().to_string()
    }

    async fn query(&self, request: &QueryRequest) -> UpstreamResult<QueryResponse> {
        let payload = serde_json::to_value(request).ok();
        let value = self.call(Operation::Query, payload).await?;
        decode(self.target_url(Operation::Query), Operation::Query, value)
    }

    async fn status(&self) -> UpstreamResult<BackendStatus> {
        let value = self.call(Operation::Status, None).await?;
        decode(self.target_url(Operation::Status), Operation::Status, value)
    }

    async fn feedback(&self, request: &FeedbackRequest) -> UpstreamResult<Value> {
        let payload = serde_json::to_value(request).ok();
        self.call(Operation::Feedback, payload).await
    }

    async fn metrics(&self) -> UpstreamResult<Value> {
        self.call(Operation::Metrics, None).await
    }
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn call(&self, operation: Operation, payload: Option<Value>) -> UpstreamResult<Value> {
        let timeout = self.timeout_for(operation);
        self.call_with_timeout(operation, payload.as_ref(), timeout)
            .await
    }

    fn target_url(&self, operation: Operation) -> String {
        self.url_for(operation)
    }
}

/// Decode a successful body into the operation's typed response.
fn decode<T: DeserializeOwned>(url: String, operation: Operation, value: Value) -> UpstreamResult<T> {
    serde_json::from_value::<T>(value.clone()).map_err(|e| {
        UpstreamError::invalid_response(
            url,
            operation.method().as_str(),
            format!("unexpected {} response shape: {e}", operation.path()),
            None,
            Some(value.to_string()),
        )
    })
}
