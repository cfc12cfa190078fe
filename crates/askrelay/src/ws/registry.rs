//! Registry of live WebSocket connections, one per session identifier.

use std::sync::atomic::{AtomicU64, Ordering};

use askrelay_protocol::RelayMessage;
use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A sender for relay messages to a specific connection.
pub type RelaySender = mpsc::UnboundedSender<RelayMessage>;

/// Registry-side half of a live connection.
#[derive(Debug)]
struct LiveConnection {
    conn_id: u64,
    tx: RelaySender,
    closed: CancellationToken,
}

/// Transport-side half of a live connection, handed to the socket task.
#[derive(Debug)]
pub struct Connection {
    /// Generation of this binding; scopes [`SessionRegistry::disconnect`].
    pub conn_id: u64,
    /// Messages to write to the socket, in delivery order.
    pub outbound: mpsc::UnboundedReceiver<RelayMessage>,
    /// Cancelled when the registry drops this binding.
    pub closed: CancellationToken,
}

/// Maps session identifiers to at most one live connection.
///
/// The registry owns every binding. Other components never hold connection
/// handles, they look them up here at delivery time.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session ID -> live connection
    connections: DashMap<String, LiveConnection>,
    next_conn_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new connection for `session_id`.
    ///
    /// A previous binding for the same identifier is replaced and closed.
    pub fn connect(&self, session_id: &str) -> Connection {
        let (tx, outbound) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        let previous = self.connections.insert(
            session_id.to_string(),
            LiveConnection {
                conn_id,
                tx,
                closed: closed.clone(),
            },
        );

        if let Some(previous) = previous {
            previous.closed.cancel();
            info!(
                "Session {} reconnected, closing superseded connection {}",
                session_id, previous.conn_id
            );
        }
        info!("Registered connection {} for session {}", conn_id, session_id);

        Connection {
            conn_id,
            outbound,
            closed,
        }
    }

    /// Release the binding for `session_id` if it still belongs to `conn_id`.
    ///
    /// Safe to call any number of times, including after the transport failed
    /// or after a newer connection took over the identifier.
    pub fn disconnect(&self, session_id: &str, conn_id: u64) -> bool {
        let removed = self
            .connections
            .remove_if(session_id, |_, conn| conn.conn_id == conn_id);

        match removed {
            Some((_, conn)) => {
                conn.closed.cancel();
                info!("Unregistered connection {} for session {}", conn_id, session_id);
                true
            }
            None => {
                debug!(
                    "Connection {} for session {} was not bound, nothing to release",
                    conn_id, session_id
                );
                false
            }
        }
    }

    /// Push a message to the session's live connection, if there is one.
    ///
    /// Returns whether the message was handed to a transport. A transport
    /// that went away releases its binding.
    pub fn send(&self, session_id: &str, message: &RelayMessage) -> bool {
        let failed_conn = match self.connections.get(session_id) {
            None => return false,
            Some(conn) => match conn.tx.send(message.clone()) {
                Ok(()) => return true,
                Err(_) => conn.conn_id,
            },
        };

        warn!(
            "Connection {} for session {} is gone, dropping binding",
            failed_conn, session_id
        );
        self.disconnect(session_id, failed_conn);
        false
    }

    /// Whether the session currently has a live connection.
    pub fn is_connected(&self, session_id: &str) -> bool {
        self.connections.contains_key(session_id)
    }

    /// Number of live bindings.
    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    /// Close every live connection.
    pub fn close_all(&self) {
        for entry in self.connections.iter() {
            entry.value().closed.cancel();
        }
        self.connections.clear();
    }
}
