//! WebSocket handler for client sessions.

use std::sync::Arc;
use std::time::Duration;

use askrelay_protocol::RelayMessage;
use axum::{
    body::Bytes,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::relay::RelayEngine;

/// Ping interval for keepalive.
const PING_INTERVAL_SECS: u64 = 30;

/// How long the writer gets to flush a close frame after the session ends.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// WebSocket upgrade handler.
///
/// GET /ws/{client_id}
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("WebSocket upgrade request for session {}", client_id);
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, relay, client_id))
}

/// Write relay messages and keepalive pings to the socket until the outbound
/// channel ends, the sink fails or `closed` is cancelled, then send a close
/// frame.
async fn write_outbound<S>(
    mut sender: S,
    mut outbound: UnboundedReceiver<RelayMessage>,
    closed: CancellationToken,
    ping_every: Duration,
) where
    S: Sink<Message> + Unpin,
{
    let mut ping_interval = interval(ping_every);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ping_interval.tick().await;

    loop {
        tokio::select! {
            maybe_message = outbound.recv() => {
                let Some(message) = maybe_message else { break };
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize relay message: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    debug!("Writer lost its socket, stopping");
                    break;
                }
            }

            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            _ = closed.cancelled() => break,
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

/// Drive one session until the client leaves or a newer connection takes over.
async fn handle_ws_connection(socket: WebSocket, relay: Arc<RelayEngine>, session_id: String) {
    let (sender, mut receiver) = socket.split();

    // Binding and replay happen before the first inbound frame is read.
    let connection = relay.connect(&session_id);
    let conn_id = connection.conn_id;
    let closed = connection.closed.clone();
    let outbound = connection.outbound;

    let mut send_task = tokio::spawn(write_outbound(
        sender,
        outbound,
        closed.clone(),
        Duration::from_secs(PING_INTERVAL_SECS),
    ));

    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => {
                info!("Session {} connection {} superseded", session_id, conn_id);
                break;
            }
            next = receiver.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                relay.handle_inbound(&session_id, text.as_str()).await;
            }
            Some(Ok(Message::Binary(_))) => {
                debug!("Received binary frame from session {}, ignoring", session_id);
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // Pong replies are handled by axum.
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Session {} closed its WebSocket", session_id);
                break;
            }
            Some(Err(e)) => {
                warn!("WebSocket error for session {}: {}", session_id, e);
                break;
            }
        }
    }

    // Clean up
    relay.disconnect(&session_id, conn_id);
    closed.cancel();
    if timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!("WebSocket connection {} closed for session {}", conn_id, session_id);
}
