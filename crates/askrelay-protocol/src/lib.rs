//! Canonical wire types for askrelay.
//!
//! The relay speaks JSON over a WebSocket. Clients send [`InboundQuery`]
//! payloads and receive a stream of [`RelayMessage`] records, the same
//! records that make up a session's replayable history.

pub mod messages;
pub mod query;

pub use messages::{MessageKind, RelayMessage};
pub use query::{InboundQuery, QueryType};
