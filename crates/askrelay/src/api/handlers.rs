//! HTTP request handlers.

use askrelay_protocol::{QueryType, RelayMessage};
use axum::{
    Json,
    extract::{Path, State},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::upstream::{FeedbackRequest, QueryRequest};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Model name reported when the backend does not name one.
const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct FrontendStatus {
    pub status: &'static str,
    pub active_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct BackendStatusView {
    pub status: &'static str,
    pub ready: bool,
    pub error: Option<String>,
    pub model: String,
}

/// Combined relay and upstream status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub frontend: FrontendStatus,
    pub backend: BackendStatusView,
}

/// Report the relay's live connections together with the upstream's health.
///
/// Never fails: an unreachable or not-ready upstream is reported as offline.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let frontend = FrontendStatus {
        status: "online",
        active_clients: state.registry().active_count(),
    };

    let backend = match state.upstream.status().await {
        Ok(status) => BackendStatusView {
            status: if status.ready { "online" } else { "offline" },
            ready: status.ready,
            error: status.error_text(),
            model: status.model.unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
        },
        Err(e) => {
            warn!("Upstream status check failed: {}", e);
            BackendStatusView {
                status: "offline",
                ready: false,
                error: Some(e.to_string()),
                model: UNKNOWN_MODEL.to_string(),
            }
        }
    };

    Json(StatusResponse { frontend, backend })
}

/// Request body for a one-shot query.
#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
    #[serde(rename = "type", default)]
    pub query_type: QueryType,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub query_id: Uuid,
    pub query: String,
    pub response: String,
    pub status: &'static str,
}

/// Forward a single query to the upstream without going through a session.
pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> ApiResult<Json<QueryResult>> {
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let query_id = Uuid::new_v4();
    info!("HTTP query {} ({})", query_id, body.query_type);

    let request = QueryRequest {
        query: body.query,
        query_type: body.query_type,
        client_id: None,
    };
    let response = state.upstream.query(&request).await?;

    Ok(Json(QueryResult {
        query_id,
        query: request.query,
        response: response.response,
        status: "success",
    }))
}

/// Request body for rating an answer.
#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub query_id: String,
    pub rating: i64,
    #[serde(default)]
    pub feedback_text: Option<String>,
}

/// Forward answer feedback to the upstream.
pub async fn feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult<Json<Value>> {
    let rating = u8::try_from(body.rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| ApiError::bad_request("rating must be between 1 and 5"))?;

    let request = FeedbackRequest {
        query_id: body.query_id,
        rating,
        feedback_text: body.feedback_text.filter(|t| !t.trim().is_empty()),
    };
    let ack = state.upstream.feedback(&request).await?;
    Ok(Json(ack))
}

/// Upstream metrics, passed through unchanged.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.upstream.metrics().await?))
}

#[derive(Debug, Serialize)]
pub struct SessionHistoryResponse {
    pub client_id: String,
    pub connected: bool,
    pub messages: Vec<RelayMessage>,
}

/// Stored history of one session, oldest first.
///
/// Unknown sessions return an empty list rather than 404: a session exists
/// as soon as a client picks its identifier.
pub async fn session_history(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Json<SessionHistoryResponse> {
    let messages = state.history().get(&client_id);
    let connected = state.registry().is_connected(&client_id);
    Json(SessionHistoryResponse {
        client_id,
        connected,
        messages,
    })
}
