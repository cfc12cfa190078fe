//! Upstream client error types.

use serde::Serialize;
use thiserror::Error;

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Broad failure category of an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// Connection, DNS or timeout failure.
    Unreachable,
    /// The upstream answered with a non-2xx status.
    Rejected,
    /// The upstream answered 2xx with a body we could not decode.
    InvalidResponse,
}

/// Structured failure of a single upstream call.
///
/// Callers get everything needed to decide whether the failure matters to
/// them: what was attempted, where, and what the upstream said back.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message} ({method} {url})")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    /// Human readable description.
    pub message: String,
    /// Target URL of the failed call.
    pub url: String,
    /// HTTP method that was attempted.
    pub method: String,
    /// Upstream status code, when a response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Raw upstream body, when one could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl UpstreamError {
    pub fn unreachable(url: impl Into<String>, method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Unreachable,
            message: message.into(),
            url: url.into(),
            method: method.into(),
            status_code: None,
            response_text: None,
            timed_out: false,
        }
    }

    pub fn timeout(url: impl Into<String>, method: impl Into<String>, secs: f64) -> Self {
        Self {
            timed_out: true,
            ..Self::unreachable(url, method, format!("request timed out after {secs}s"))
        }
    }

    pub fn rejected(
        url: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        response_text: Option<String>,
    ) -> Self {
        Self {
            kind: UpstreamErrorKind::Rejected,
            message: format!("upstream responded with status {status_code}"),
            url: url.into(),
            method: method.into(),
            status_code: Some(status_code),
            response_text,
            timed_out: false,
        }
    }

    pub fn invalid_response(
        url: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        response_text: Option<String>,
    ) -> Self {
        Self {
            kind: UpstreamErrorKind::InvalidResponse,
            message: message.into(),
            url: url.into(),
            method: method.into(),
            status_code,
            response_text,
            timed_out: false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}
