//! WebSocket transport for relay sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Browser client              │  GET /ws/{client_id}
//! │  - sends {query, type}       │
//! │  - receives RelayMessage     │
//! └──────────────┬───────────────┘
//!                │ WebSocket (JSON text frames)
//! ┌──────────────▼───────────────┐
//! │  handler (one task/session)  │  reads inbound frames, writes outbound
//! └──────────────┬───────────────┘
//!                │
//! ┌──────────────▼───────────────┐     ┌───────────────────┐
//! │  RelayEngine                 ├────►│  SessionRegistry  │  id -> live connection
//! │                              ├────►│  HistoryStore     │  id -> last 50 messages
//! │                              ├────►│  UpstreamClient   │  inference backend
//! └──────────────────────────────┘     └───────────────────┘
//! ```

mod handler;
mod registry;

pub use handler::ws_handler;
pub use registry::{Connection, RelaySender, SessionRegistry};
