//! Shared event vocabulary for the bitgrid realtime wire protocol.
//!
//! This crate owns the wire representation used by both `server` and
//! `replica`. Events travel as internally-tagged JSON text over one
//! persistent websocket per participant. The vocabulary is small and fixed,
//! so both directions are typed enums rather than free-form payload maps.
//!
//! The room a connection belongs to is not an event: it is fixed at connect
//! time via the handshake (`?room=` query parameter) and never changes for
//! the life of the connection.

use std::collections::BTreeMap;

use grid::PixelGrid;
use serde::{Deserialize, Serialize};

// =============================================================================
// SHARED CONSTANTS
// =============================================================================

/// Width of every authoritative room canvas.
pub const CANVAS_WIDTH: usize = 89;

/// Height of every authoritative room canvas.
pub const CANVAS_HEIGHT: usize = 89;

/// The fixed, statically known room set. Rooms are never created on demand.
pub const ROOM_KEYS: [&str; 4] = ["a", "b", "c", "d"];

/// True if `key` names one of the fixed rooms.
#[must_use]
pub fn is_room_key(key: &str) -> bool {
    ROOM_KEYS.contains(&key)
}

/// Viewport pan offset as `[x, y]`, in canvas cells.
pub type Pan = [i64; 2];

// =============================================================================
// EVENTS
// =============================================================================

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Request the room's canvas snapshot and member list. The reply is
    /// point-to-point, never broadcast.
    FetchState,
    /// Reset the room's canvas to all-zero.
    ClearCanvas,
    /// Single-cell edit. `x`/`y` are viewport-relative; the server applies
    /// the edit at `(x + pan[0], y + pan[1])`.
    SetPixel { x: i64, y: i64, pan: Pan, value: u8 },
    /// Rectangular edit at an absolute canvas origin.
    ApplyChunk { origin_x: i64, origin_y: i64, block: PixelGrid },
    /// Non-state relay: ask peers to play a sound cue.
    SoundEffect { key: String },
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reply to [`ClientEvent::FetchState`]: authoritative canvas plus the
    /// current member list.
    StateSnapshot { grid: PixelGrid, members: Vec<String> },
    /// Room membership snapshot, sent to the whole room on join and leave.
    MemberList { members: Vec<String> },
    /// Global presence snapshot: member count per room, zero included.
    /// Sent to every connection, lobby included.
    RoomCounts { counts: BTreeMap<String, usize> },
    /// Full-canvas replacement (after a clear).
    UpdateFullGrid { grid: PixelGrid },
    /// A peer's single-cell edit, relayed with its original payload.
    UpdatePixel { x: i64, y: i64, pan: Pan, value: u8 },
    /// A peer's rectangular edit.
    UpdateChunk { origin_x: i64, origin_y: i64, block: PixelGrid },
    /// A peer's sound cue.
    SoundEffect { key: String },
}

// =============================================================================
// CODEC
// =============================================================================

/// Error returned by the decode helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a client event as wire text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_client_event(event: &ClientEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a client event from wire text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] on malformed or unknown payloads.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a server event as wire text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a server event from wire text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] on malformed or unknown payloads.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
