//! Upstream request and response types.

use askrelay_protocol::QueryType;
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Operations exposed by the inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Status,
    Query,
    Feedback,
    Metrics,
}

impl Operation {
    /// Path of the operation relative to the upstream base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Query => "query",
            Self::Feedback => "feedback",
            Self::Metrics => "metrics",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::Status | Self::Metrics => Method::GET,
            Self::Query | Self::Feedback => Method::POST,
        }
    }

    /// Whether the operation gets the long inference timeout.
    pub fn is_slow(self) -> bool {
        matches!(self, Self::Query)
    }
}

/// Body of an upstream `query` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(rename = "type", default)]
    pub query_type: QueryType,
    /// Session identifier of the originating WebSocket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Response of an upstream `query` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text; null becomes empty and other JSON values are rendered.
    #[serde(default, deserialize_with = "lenient_text")]
    pub response: String,
    /// Anything else the backend returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Response of an upstream `status` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
}

impl BackendStatus {
    /// The backend's self-reported error, rendered as text.
    pub fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Body of an upstream `feedback` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub query_id: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_routing() {
        assert_eq!(Operation::Query.method(), Method::POST);
        assert_eq!(Operation::Status.method(), Method::GET);
        assert!(Operation::Query.is_slow());
        assert!(!Operation::Metrics.is_slow());
    }

    #[test]
    fn test_query_request_body() {
        let req = QueryRequest {
            query: "hello".into(),
            query_type: QueryType::Standard,
            client_id: Some("A".into()),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"query": "hello", "type": "standard", "client_id": "A"})
        );
    }

    #[test]
    fn test_query_response_keeps_extra_fields() {
        let resp: QueryResponse =
            serde_json::from_value(json!({"response": "hi", "sources": [1, 2]})).unwrap();
        assert_eq!(resp.response, "hi");
        assert_eq!(resp.extra["sources"], json!([1, 2]));

        let empty: QueryResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.response, "");
    }

    #[test]
    fn test_query_response_tolerates_non_string_answers() {
        let null: QueryResponse = serde_json::from_value(json!({"response": null})).unwrap();
        assert_eq!(null.response, "");

        let number: QueryResponse = serde_json::from_value(json!({"response": 42})).unwrap();
        assert_eq!(number.response, "42");

        let object: QueryResponse =
            serde_json::from_value(json!({"response": {"text": "hi"}})).unwrap();
        assert_eq!(object.response, r#"{"text":"hi"}"#);
    }

    #[test]
    fn test_backend_status_error_text() {
        let status: BackendStatus =
            serde_json::from_value(json!({"ready": false, "error": {"code": 1}})).unwrap();
        assert_eq!(status.error_text().as_deref(), Some(r#"{"code":1}"#));

        let status: BackendStatus = serde_json::from_value(json!({"ready": true})).unwrap();
        assert!(status.ready);
        assert_eq!(status.error_text(), None);
    }
}
