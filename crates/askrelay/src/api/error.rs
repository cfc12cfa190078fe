//! Unified API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::upstream::{UpstreamError, UpstreamErrorKind};

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Upstream(e) => match e.kind {
                UpstreamErrorKind::Unreachable if e.is_timeout() => "UPSTREAM_TIMEOUT",
                UpstreamErrorKind::Unreachable => "UPSTREAM_UNREACHABLE",
                UpstreamErrorKind::Rejected => "UPSTREAM_REJECTED",
                UpstreamErrorKind::InvalidResponse => "UPSTREAM_INVALID_RESPONSE",
            },
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        let details = match &self {
            ApiError::Upstream(e) => {
                warn!(error_code = code, url = %e.url, message = %e.message, "Upstream unavailable");
                e.response_text.clone()
            }
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
                None
            }
            ApiError::BadRequest(_) => {
                tracing::debug!(error_code = code, message = %message, "Client error");
                None
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
