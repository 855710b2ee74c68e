//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the synchronization engine's business logic — the
//! authoritative grids, presence bookkeeping, protocol handling, and
//! announcements — so the route layer can stay focused on transport
//! plumbing.

pub mod notify;
pub mod presence;
pub mod registry;
pub mod sync;
