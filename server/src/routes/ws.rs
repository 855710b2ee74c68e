//! WebSocket handler — the realtime sync transport.
//!
//! DESIGN
//! ======
//! On upgrade, the optional `?room=` query parameter fixes the connection's
//! room for its whole lifetime (no later join/leave transition exists).
//! Unknown room keys are rejected before the upgrade. The connection then
//! enters a `select!` loop:
//! - Incoming client text → decode + dispatch to the pure handlers in
//!   `services::sync`
//! - Events queued by peers → forward to the client
//!
//! Handlers mutate sync state and return [`Action`]s; [`apply_actions`] is
//! the single delivery point. It runs while the write guard is still held,
//! so enqueue order equals the event loop's arrival order for every
//! recipient. Delivery itself is best-effort `try_send` — a client with a
//! full channel misses the event rather than stalling the loop.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::notify::Notifier;
use crate::services::sync::{self, Action};
use crate::state::{AppState, SyncState};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let room = params.get("room").cloned();
    if let Some(key) = &room {
        if !protocol::is_room_key(key) {
            warn!(room = %key, "ws: rejecting connect to unknown room");
            return (StatusCode::NOT_FOUND, "unknown room").into_response();
        }
    }

    ws.on_upgrade(move |socket| run_ws(socket, state, room))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, room: Option<String>) {
    let session_id = Uuid::new_v4();

    // Per-connection channel; peers enqueue here, the loop below drains it.
    // Point-to-point replies take the same path so ordering is uniform.
    let (tx, mut rx) = mpsc::channel(256);

    {
        let mut sync = state.sync.write().await;
        let actions = sync::handle_connect(&mut sync, session_id, room.as_deref(), tx, &state.room_base_url);
        apply_actions(&sync, &state.notifier, session_id, actions);
    }
    info!(%session_id, room = room.as_deref().unwrap_or("lobby"), "ws: session connected");

    let reason = loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break "transport closed" };
                match msg {
                    Message::Text(text) => dispatch_event(&state, session_id, text.as_str()).await,
                    Message::Close(_) => break "client closed",
                    _ => {}
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break "outbound channel closed" };
                if send_event(&mut socket, &event).await.is_err() {
                    break "send failed";
                }
            }
        }
    };

    {
        let mut sync = state.sync.write().await;
        let actions = sync::handle_disconnect(&mut sync, session_id, reason, &state.room_base_url);
        apply_actions(&sync, &state.notifier, session_id, actions);
    }
    info!(%session_id, reason, "ws: session disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode one inbound text frame and run it through the protocol handler.
/// Malformed payloads are logged and dropped; nothing reaches peers.
async fn dispatch_event(state: &AppState, session_id: Uuid, text: &str) {
    let event = match protocol::decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: invalid inbound event");
            return;
        }
    };

    let mut sync = state.sync.write().await;
    let actions = sync::handle_event(&mut sync, session_id, event);
    apply_actions(&sync, &state.notifier, session_id, actions);
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Resolve each action's audience against the connection map and enqueue the
/// event. Must be called with the sync guard still held so deliveries from
/// consecutive events cannot interleave.
pub(crate) fn apply_actions(sync: &SyncState, notifier: &Notifier, sender: Uuid, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::Reply(event) => {
                if let Some(conn) = sync.connections.get(&sender) {
                    // Best-effort: if the client's channel is full, skip it.
                    let _ = conn.tx.try_send(event);
                }
            }
            Action::Room { room, event, exclude } => {
                for (session_id, conn) in &sync.connections {
                    if conn.room.as_deref() != Some(room.as_str()) || exclude == Some(*session_id) {
                        continue;
                    }
                    let _ = conn.tx.try_send(event.clone());
                }
            }
            Action::All(event) => {
                for conn in sync.connections.values() {
                    let _ = conn.tx.try_send(event.clone());
                }
            }
            Action::Announce(text) => notifier.send(&text),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &protocol::ServerEvent) -> Result<(), ()> {
    let json = match protocol::encode_server_event(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
