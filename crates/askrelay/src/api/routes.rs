//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::ws;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Browser frontends are served from anywhere.
    let cors = CorsLayer::permissive();

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let static_dir = state.static_dir.clone();

    let api_routes = Router::new()
        .route("/query", post(handlers::query))
        .route("/feedback", post(handlers::feedback))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/sessions/{client_id}/history",
            get(handlers::session_history),
        );

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/ws/{client_id}", get(ws::ws_handler))
        .nest("/api", api_routes)
        .with_state(state);

    let router = match static_dir {
        Some(dir) => {
            tracing::info!("Serving static files from {}", dir.display());
            router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        None => router,
    };

    router.layer(cors).layer(trace_layer)
}
