//! Client-side replica of a room's canvas.
//!
//! The [`ReplicaStore`] mirrors the authoritative server grid, applies local
//! edits optimistically before any network round trip, and materializes
//! inbound server events last-write-wins. The host (UI or terminal client)
//! owns the transport; the store only produces outbound events and surfaces
//! cues as values.

mod store;

pub use store::{Cue, ReplicaStore};
