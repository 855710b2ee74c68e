//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. All
//! synchronized state — the room registry, the presence tracker, and the live
//! connection map — lives together behind one `RwLock` as [`SyncState`].
//! Every inbound event takes the write guard, mutates, and enqueues its
//! fan-out before releasing it, so mutation and delivery order equal arrival
//! order for every recipient. Mutual exclusion is structural: the grids
//! themselves carry no locking.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::ServerEvent;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::services::notify::Notifier;
use crate::services::presence::PresenceTracker;
use crate::services::registry::RoomRegistry;

// =============================================================================
// CONNECTION
// =============================================================================

/// One live websocket connection. The room is fixed at connect time;
/// `None` means the session sits in the lobby and never sees canvas data.
pub struct Connection {
    pub room: Option<String>,
    /// Sender for outgoing events; the connection's `select!` loop drains it.
    pub tx: mpsc::Sender<ServerEvent>,
}

// =============================================================================
// SYNC STATE
// =============================================================================

/// Everything the protocol handler mutates, guarded as one unit.
pub struct SyncState {
    pub registry: RoomRegistry,
    pub presence: PresenceTracker,
    pub connections: HashMap<Uuid, Connection>,
}

impl SyncState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RoomRegistry::new(),
            presence: PresenceTracker::new(),
            connections: HashMap::new(),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum — inner state is
/// Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<RwLock<SyncState>>,
    pub notifier: Notifier,
    /// Base URL announcements link to; the room key is appended as `/{room}`.
    pub room_base_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(notifier: Notifier, room_base_url: String) -> Self {
        Self { sync: Arc::new(RwLock::new(SyncState::new())), notifier, room_base_url }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
