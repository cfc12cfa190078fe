//! Relay message records.
//!
//! A [`RelayMessage`] is one immutable unit of a session's conversation.
//! On the wire it is a flat JSON object:
//!
//! ```json
//! {"type": "assistant", "content": "hi", "timestamp": 1718000000.123}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a relay message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Echo of a query the client sent.
    User,
    /// Progress notice while the upstream call is in flight.
    Status,
    /// Answer produced by the upstream service.
    Assistant,
    /// Upstream failure reported back to the client.
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Status => "status",
            Self::Assistant => "assistant",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped, kind-tagged message in a session's history.
///
/// Fields are private so a record cannot change after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(rename = "type")]
    kind: MessageKind,
    content: String,
    #[serde(with = "unix_seconds")]
    timestamp: DateTime<Utc>,
}

impl RelayMessage {
    /// Create a message stamped with the current time.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Status, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, content)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Timestamps travel as fractional Unix seconds.
mod unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(ts.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("timestamp must be a finite number"));
        }
        let micros = (secs * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| de::Error::custom("timestamp out of range"))
    }
}
