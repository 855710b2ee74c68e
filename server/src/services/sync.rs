//! Synchronization protocol handler.
//!
//! DESIGN
//! ======
//! Handlers are pure business logic: they validate, mutate the registry and
//! presence tracker, and return a list of [`Action`]s. The websocket layer
//! owns all outbound concerns — it resolves each action's audience against
//! the connection map and enqueues deliveries. That keeps ordering and
//! fan-out testable without a network.
//!
//! Edits are rebroadcast to *other* room members only, never echoed to the
//! sender: the sender already applied the edit to its own replica
//! optimistically, so an echo would double-apply and add a round trip.
//!
//! ERROR HANDLING
//! ==============
//! Protocol misuse (unknown room, out-of-bounds coordinates, canvas events
//! from the lobby) is logged and dropped. The offending event mutates
//! nothing, is never surfaced to other participants, and never takes down
//! the event loop.

use protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{Connection, SyncState};

// =============================================================================
// ACTIONS
// =============================================================================

/// Outbound work produced by a handler. The delivery layer resolves the
/// audience; handlers never send anything themselves.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Send to the originating connection only (point-to-point reply).
    Reply(ServerEvent),
    /// Send to every member of `room`, optionally excluding one session.
    Room { room: String, event: ServerEvent, exclude: Option<Uuid> },
    /// Send to every connection, lobby included.
    All(ServerEvent),
    /// Hand text to the notifier, fire-and-forget.
    Announce(String),
}

// =============================================================================
// CONNECT / DISCONNECT
// =============================================================================

/// Register a new connection. `room` is fixed here for the connection's
/// lifetime; `None` leaves the session in the lobby, which still receives the
/// global room-counts snapshot so late lobby joiners see live state.
pub fn handle_connect(
    sync: &mut SyncState,
    session_id: Uuid,
    room: Option<&str>,
    tx: mpsc::Sender<ServerEvent>,
    room_base_url: &str,
) -> Vec<Action> {
    sync.connections
        .insert(session_id, Connection { room: room.map(str::to_owned), tx });

    let mut actions = Vec::new();
    if let Some(room) = room {
        sync.presence.join(session_id, room);
        let members = member_ids(sync, room);
        let count = members.len();
        info!(%session_id, room, count, "session joined room");

        actions.push(Action::Room {
            room: room.to_owned(),
            event: ServerEvent::MemberList { members },
            exclude: None,
        });
        actions.push(Action::Announce(format!(
            "{count} user(s) connected: {room_base_url}/{room}"
        )));
    } else {
        info!(%session_id, "session joined the lobby");
    }

    actions.push(Action::All(ServerEvent::RoomCounts { counts: sync.presence.counts_by_room() }));
    actions
}

/// Tear down a connection. The member-list broadcast goes to the remaining
/// members; the "room emptied" announcement fires only when the count drops
/// to zero; the global counts snapshot always goes to everyone.
pub fn handle_disconnect(
    sync: &mut SyncState,
    session_id: Uuid,
    reason: &str,
    room_base_url: &str,
) -> Vec<Action> {
    sync.connections.remove(&session_id);

    let mut actions = Vec::new();
    if let Some(room) = sync.presence.leave(session_id) {
        let members = member_ids(sync, &room);
        info!(%session_id, room, reason, remaining = members.len(), "session left room");

        let emptied = members.is_empty();
        actions.push(Action::Room {
            room: room.clone(),
            event: ServerEvent::MemberList { members },
            exclude: None,
        });
        if emptied {
            actions.push(Action::Announce(format!("Party's over: {room_base_url}/{room}")));
        }
    } else {
        info!(%session_id, reason, "lobby session disconnected");
    }

    actions.push(Action::All(ServerEvent::RoomCounts { counts: sync.presence.counts_by_room() }));
    actions
}

// =============================================================================
// INBOUND EVENTS
// =============================================================================

/// Process one inbound event from a connected session.
pub fn handle_event(sync: &mut SyncState, session_id: Uuid, event: ClientEvent) -> Vec<Action> {
    // Canvas access requires a room; lobby sessions issue no canvas events.
    let Some(room) = sync
        .connections
        .get(&session_id)
        .and_then(|conn| conn.room.clone())
    else {
        warn!(%session_id, ?event, "dropping canvas event from lobby session");
        return Vec::new();
    };

    match event {
        ClientEvent::FetchState => match sync.registry.snapshot(&room) {
            Ok(canvas) => {
                let members = member_ids(sync, &room);
                vec![Action::Reply(ServerEvent::StateSnapshot { grid: canvas, members })]
            }
            Err(e) => {
                warn!(%session_id, room, error = %e, "dropping fetch_state");
                Vec::new()
            }
        },

        ClientEvent::ClearCanvas => {
            // Always the caller's own room; the requester has already cleared
            // locally, so only the other members get the replacement grid.
            if let Err(e) = sync.registry.reset(&room) {
                warn!(%session_id, room, error = %e, "dropping clear_canvas");
                return Vec::new();
            }
            info!(%session_id, room, "canvas cleared");
            match sync.registry.snapshot(&room) {
                Ok(canvas) => vec![Action::Room {
                    room,
                    event: ServerEvent::UpdateFullGrid { grid: canvas },
                    exclude: Some(session_id),
                }],
                Err(e) => {
                    warn!(%session_id, room, error = %e, "dropping clear_canvas broadcast");
                    Vec::new()
                }
            }
        }

        ClientEvent::SetPixel { x, y, pan, value } => {
            // The pan offset converts viewport coordinates to absolute ones;
            // peers receive the original payload and do the same conversion.
            // Both values come off the wire, so the addition must not trust
            // them: an overflowing sum is out of bounds by definition.
            let Some((abs_x, abs_y)) = x.checked_add(pan[0]).zip(y.checked_add(pan[1])) else {
                warn!(%session_id, room, x, y, "dropping pixel edit with overflowing pan offset");
                return Vec::new();
            };
            match sync.registry.set_pixel(&room, abs_x, abs_y, value) {
                Ok(()) => vec![Action::Room {
                    room,
                    event: ServerEvent::UpdatePixel { x, y, pan, value },
                    exclude: Some(session_id),
                }],
                Err(e) => {
                    warn!(%session_id, room, x, y, error = %e, "dropping pixel edit");
                    Vec::new()
                }
            }
        }

        ClientEvent::ApplyChunk { origin_x, origin_y, block } => {
            match sync.registry.apply_chunk(&room, origin_x, origin_y, &block) {
                Ok(()) => vec![Action::Room {
                    room,
                    event: ServerEvent::UpdateChunk { origin_x, origin_y, block },
                    exclude: Some(session_id),
                }],
                Err(e) => {
                    warn!(%session_id, room, origin_x, origin_y, error = %e, "dropping chunk edit");
                    Vec::new()
                }
            }
        }

        // Pure relay, no state mutation.
        ClientEvent::SoundEffect { key } => vec![Action::Room {
            room,
            event: ServerEvent::SoundEffect { key },
            exclude: Some(session_id),
        }],
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Member ids of a room as wire strings, in stable order.
fn member_ids(sync: &SyncState, room: &str) -> Vec<String> {
    sync.presence
        .members_of(room)
        .iter()
        .map(Uuid::to_string)
        .collect()
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
