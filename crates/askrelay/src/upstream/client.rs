//! Upstream HTTP client.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{UpstreamError, UpstreamResult};
use super::types::Operation;

/// Upper bound for the `query` timeout, in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 120;

/// Upstream connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the inference backend (e.g. "http://localhost:7860").
    pub base_url: String,
    /// Bearer token sent with every call when set.
    pub api_key: Option<String>,
    /// Timeout for `query` calls, in seconds (at most 120).
    pub query_timeout_secs: u64,
    /// Timeout for `status`, `metrics` and `feedback` calls, in seconds.
    pub short_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7860".to_string(),
            api_key: None,
            query_timeout_secs: 60,
            short_timeout_secs: 5,
        }
    }
}

/// Client for the inference backend.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    api_key: Option<String>,
    query_timeout: Duration,
    short_timeout: Duration,
}

impl UpstreamClient {
    /// Create a new client from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let short_timeout = Duration::from_secs(config.short_timeout_secs.max(1));
        let client = Client::builder()
            .connect_timeout(short_timeout)
            .user_agent(concat!("askrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            query_timeout: Duration::from_secs(
                config.query_timeout_secs.clamp(1, MAX_QUERY_TIMEOUT_SECS),
            ),
            short_timeout,
        })
    }

    /// Override the timeout used for `query` calls.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Override the timeout used for every other operation.
    pub fn with_short_timeout(mut self, timeout: Duration) -> Self {
        self.short_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an operation.
    pub fn url_for(&self, operation: Operation) -> String {
        format!(
            "{}/{}",
            self.base_url,
            operation.path().trim_start_matches('/')
        )
    }

    pub fn timeout_for(&self, operation: Operation) -> Duration {
        if operation.is_slow() {
            self.query_timeout
        } else {
            self.short_timeout
        }
    }

    /// Perform one call with an explicit timeout.
    ///
    /// Every failure mode comes back as an [`UpstreamError`].
    pub async fn call_with_timeout(
        &self,
        operation: Operation,
        payload: Option<&Value>,
        timeout: Duration,
    ) -> UpstreamResult<Value> {
        let url = self.url_for(operation);
        let method = operation.method();
        debug!("Upstream {} {} (timeout {:?})", method, url, timeout);

        let mut request = self.client.request(method.clone(), &url).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if method == Method::POST {
            request = request.json(payload.unwrap_or(&Value::Null));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&url, &method, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            warn!("Upstream {} {} rejected with {}", method, url, status);
            return Err(UpstreamError::rejected(
                url,
                method.as_str(),
                status.as_u16(),
                body,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, &method, timeout, e))?;

        serde_json::from_str(&body).map_err(|e| {
            UpstreamError::invalid_response(
                url.clone(),
                method.as_str(),
                format!("failed to parse upstream response: {e}"),
                Some(status.as_u16()),
                Some(body.clone()),
            )
        })
    }
}

fn transport_error(url: &str, method: &Method, timeout: Duration, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        warn!("Upstream {} {} timed out after {:?}", method, url, timeout);
        UpstreamError::timeout(url, method.as_str(), timeout.as_secs_f64())
    } else {
        warn!("Upstream {} {} failed: {}", method, url, err);
        UpstreamError::unreachable(url, method.as_str(), format!("request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_join_normalizes_slashes() {
        assert_eq!(
            client("http://backend:7860/").url_for(Operation::Query),
            "http://backend:7860/query"
        );
        assert_eq!(
            client("http://backend:7860///").url_for(Operation::Status),
            "http://backend:7860/status"
        );
        assert_eq!(
            client("http://backend/api").url_for(Operation::Metrics),
            "http://backend/api/metrics"
        );
    }

    #[test]
    fn test_timeouts_per_operation() {
        let c = client("http://backend");
        assert_eq!(c.timeout_for(Operation::Query), Duration::from_secs(60));
        assert_eq!(c.timeout_for(Operation::Status), Duration::from_secs(5));
        assert_eq!(c.timeout_for(Operation::Feedback), Duration::from_secs(5));

        let c = c.with_query_timeout(Duration::from_secs(120));
        assert_eq!(c.timeout_for(Operation::Query), Duration::from_secs(120));
    }

    #[test]
    fn test_query_timeout_is_capped() {
        let c = UpstreamClient::new(&UpstreamConfig {
            query_timeout_secs: 600,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(c.timeout_for(Operation::Query), Duration::from_secs(120));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let c = UpstreamClient::new(&UpstreamConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(c.api_key.is_none());
    }
}
