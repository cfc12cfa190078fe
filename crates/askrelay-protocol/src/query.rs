//! Inbound query payloads.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Answering mode requested by the client.
///
/// Unknown mode names fall back to [`QueryType::Standard`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    Standard,
    Complete,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Complete => "complete",
        }
    }

    /// Map a mode name onto the closed set, defaulting when unrecognised.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "complete" => Self::Complete,
            _ => Self::Standard,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QueryType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A query received over a client's WebSocket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundQuery {
    pub query: String,
    pub query_type: QueryType,
}

impl InboundQuery {
    pub fn new(query: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query: query.into(),
            query_type,
        }
    }

    /// Parse a raw text frame.
    ///
    /// Never fails: text that is not JSON is treated like an empty object
    /// and every missing or mistyped field takes its default.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::default(),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let query = value
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let query_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(QueryType::from_name)
            .unwrap_or_default();

        Self { query, query_type }
    }
}
