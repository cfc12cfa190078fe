//! askrelay library.
//!
//! Bridges many persistent WebSocket sessions to a single upstream
//! inference service and keeps a bounded, replayable history per session.

pub mod api;
pub mod history;
pub mod relay;
pub mod upstream;
pub mod ws;

pub use askrelay_protocol as protocol;
