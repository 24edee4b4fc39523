// WebSocket server that streams session room events to browser clients.
//
// Clients send `{"event": "session:join", "data": {"sessionId", "token"}}`
// to subscribe to a session they own. From then on every event published to
// that session's room is written to the socket as JSON text.

use std::collections::HashMap;
use std::net::SocketAddr;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use mockview_app::hub::{session_room, ServerEvent};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::http::AppState;

/// Queued outbound events per connection before the room forwarders wait.
const OUTBOUND_CAPACITY: usize = 128;

/// Queued inbound client messages per connection.
const INBOUND_CAPACITY: usize = 32;

/// A decoded client message, or the error text for one that did not parse.
pub type Inbound = Result<ClientMessage, String>;

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "session:join", rename_all = "camelCase")]
    Join { session_id: String, token: String },
}

/// Bind the WebSocket listener on all interfaces.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    Ok(listener)
}

/// Accept connections forever, handling each on its own task.
pub async fn run(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Accepted TCP connection from {addr}");
        tokio::spawn(handle_connection(stream, addr, state.clone()));
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: AppState) {
    let addr = addr.to_string();
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    info!("WebSocket client connected: {addr}");

    let (mut write, read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_CAPACITY);
    let (msg_tx, mut msg_rx) = mpsc::channel::<Inbound>(INBOUND_CAPACITY);

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize event for {writer_addr}: {e}");
                    continue;
                }
            };
            if let Err(e) = write.send(Message::text(text)).await {
                debug!("Write to {writer_addr} failed: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    let reader_addr = addr.clone();
    let reader = tokio::spawn(async move {
        let _ = read_client_messages(read, &msg_tx, &reader_addr).await;
    });

    let hub = state.controller.hub().clone();
    let mut rooms: HashMap<String, JoinHandle<()>> = HashMap::new();
    while let Some(message) = msg_rx.recv().await {
        let joined = match message {
            Ok(ClientMessage::Join { session_id, token }) => {
                join_session(&state, session_id, &token).await
            }
            Err(malformed) => Err(malformed),
        };
        let reply = match joined {
            Ok(session_id) => {
                // A forwarder ends when its room is closed; rejoining resubscribes.
                let live = rooms.get(&session_id).is_some_and(|f| !f.is_finished());
                if !live {
                    let rx = hub.subscribe(&session_room(&session_id));
                    rooms.insert(session_id.clone(), tokio::spawn(forward_room(rx, out_tx.clone())));
                }
                info!("Client {addr} joined session {session_id}");
                ServerEvent::SessionJoined { session_id }
            }
            Err(message) => {
                warn!("Rejected message from {addr}: {message}");
                ServerEvent::SessionError { message }
            }
        };
        if out_tx.send(reply).await.is_err() {
            break;
        }
    }

    for (session_id, forwarder) in rooms.drain() {
        forwarder.abort();
        // Wait for the task to drop its receiver before checking the room.
        let _ = forwarder.await;
        if hub.release(&session_room(&session_id)) {
            debug!("Released room for session {session_id} after {addr} left");
        }
    }
    drop(out_tx);
    reader.abort();
    let _ = writer.await;
    info!("WebSocket client disconnected: {addr}");
}

/// Check a join request. Returns the session id to subscribe to, or the
/// message to send back as `session:error`.
async fn join_session(state: &AppState, session_id: String, token: &str) -> Result<String, String> {
    let user_id = state
        .verifier
        .verify(token)
        .map_err(|_| "Unauthorized".to_string())?;

    match state.controller.session_owner(&session_id).await {
        Ok(Some(owner)) if owner == user_id => Ok(session_id),
        Ok(_) => Err("Session not found".to_string()),
        Err(e) => {
            warn!("Lookup for session {session_id} failed: {e}");
            Err("Internal server error".to_string())
        }
    }
}

/// Copy events from one room subscription into a connection's outbound queue.
async fn forward_room(mut rx: broadcast::Receiver<ServerEvent>, out_tx: mpsc::Sender<ServerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if out_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("WebSocket client lagging, skipped {skipped} event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Decode client frames from any [`Stream`] of WebSocket messages and queue
/// them on `tx`, in order. Text that is not a known client message is
/// queued as `Err` carrying the `session:error` text. Non-text frames are
/// skipped; a close frame or socket error ends the read.
///
/// Returns `Err(())` once nothing is receiving from `tx`.
pub async fn read_client_messages<St>(
    mut frames: St,
    tx: &mpsc::Sender<Inbound>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = frames.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                debug!("Client {addr} sent close frame");
                return Ok(());
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                return Ok(());
            }
        };
        let decoded = serde_json::from_str::<ClientMessage>(text.as_str())
            .map_err(|e| format!("Malformed message: {e}"));
        tx.send(decoded).await.map_err(|_| ())?;
    }
    Ok(())
}
