//! HTTP API module.
//!
//! Health and status endpoints, one-shot upstream passthroughs, session
//! history inspection and the WebSocket entry point.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{HealthResponse, StatusResponse};
pub use routes::create_router;
pub use state::AppState;
