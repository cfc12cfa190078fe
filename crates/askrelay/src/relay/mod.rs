//! Relay engine.
//!
//! Drives one session's conversation: replay on connect, then for every
//! inbound query the fixed sequence
//!
//! ```text
//! user -> status("processing") -> upstream query -> assistant | error
//! ```
//!
//! Every message is appended to the session's history before it is pushed to
//! the live connection, so a client that is away when an answer lands sees it
//! on its next connect.

use std::sync::Arc;

use askrelay_protocol::{InboundQuery, RelayMessage};
use log::{debug, info, warn};

use crate::history::HistoryStore;
use crate::upstream::{QueryRequest, UpstreamApi, UpstreamError};
use crate::ws::{Connection, SessionRegistry};

/// Content of the status message emitted while the upstream call runs.
pub const PROCESSING_STATUS: &str = "processing";

/// How a single inbound query ended.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The upstream answered; an `assistant` message was appended.
    Answered,
    /// The upstream failed; an `error` message was appended.
    Failed(UpstreamError),
}

impl QueryOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered)
    }
}

/// Orchestrates sessions, their history and the upstream service.
pub struct RelayEngine {
    registry: Arc<SessionRegistry>,
    history: Arc<HistoryStore>,
    upstream: Arc<dyn UpstreamApi>,
}

impl RelayEngine {
    pub fn new(
        registry: Arc<SessionRegistry>,
        history: Arc<HistoryStore>,
        upstream: Arc<dyn UpstreamApi>,
    ) -> Self {
        Self {
            registry,
            history,
            upstream,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Bind a new connection for the session and queue its stored history.
    ///
    /// The history lock is held while binding, so the replayed messages are
    /// the first things on the new connection and no concurrent append can
    /// be lost or duplicated in between.
    pub fn connect(&self, session_id: &str) -> Connection {
        self.history.with_history(session_id, |messages| {
            let connection = self.registry.connect(session_id);
            for message in messages {
                self.registry.send(session_id, message);
            }
            if !messages.is_empty() {
                info!(
                    "Replayed {} message(s) to session {}",
                    messages.len(),
                    session_id
                );
            }
            connection
        })
    }

    /// Release a connection binding. History is left untouched.
    pub fn disconnect(&self, session_id: &str, conn_id: u64) {
        self.registry.disconnect(session_id, conn_id);
    }

    /// Append a message to the session's history, then push it to the live
    /// connection if there is one. Returns whether it was pushed.
    pub fn deliver(&self, session_id: &str, message: RelayMessage) -> bool {
        self.history.append_then(session_id, message, |stored| {
            self.registry.send(session_id, stored)
        })
    }

    /// Handle one raw text frame from a client.
    pub async fn handle_inbound(&self, session_id: &str, payload: &str) -> QueryOutcome {
        self.handle_query(session_id, InboundQuery::parse(payload))
            .await
    }

    /// Run the query sequence for one inbound query.
    pub async fn handle_query(&self, session_id: &str, inbound: InboundQuery) -> QueryOutcome {
        debug!(
            "Session {} query ({}): {} chars",
            session_id,
            inbound.query_type,
            inbound.query.len()
        );

        self.deliver(session_id, RelayMessage::user(inbound.query.clone()));
        self.deliver(session_id, RelayMessage::status(PROCESSING_STATUS));

        let request = QueryRequest {
            query: inbound.query,
            query_type: inbound.query_type,
            client_id: Some(session_id.to_string()),
        };

        match self.upstream.query(&request).await {
            Ok(response) => {
                self.deliver(session_id, RelayMessage::assistant(response.response));
                QueryOutcome::Answered
            }
            Err(err) => {
                warn!("Upstream query for session {} failed: {}", session_id, err);
                self.deliver(session_id, RelayMessage::error(format!("Backend error: {err}")));
                QueryOutcome::Failed(err)
            }
        }
    }
}
