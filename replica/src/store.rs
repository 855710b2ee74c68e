#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;

use grid::{GridError, PixelGrid};
use protocol::{CANVAS_HEIGHT, CANVAS_WIDTH, ClientEvent, Pan, ServerEvent};

/// Side effect surfaced to the host instead of performed. The store never
/// plays audio or touches a UI; it hands back a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// Viewport moved; `short` jumps get a different sound.
    Navigate { short: bool },
    /// A peer relayed a sound effect.
    Sound(String),
}

/// Local mirror of one room's canvas plus viewport state.
///
/// Local edit operations are the explicit optimistic-apply step: they mutate
/// the mirror first and return the outbound [`ClientEvent`] for the host to
/// send. No acknowledgment exists and none is awaited; inbound server events
/// are applied last-write-wins on top.
///
/// The flip flags and short-jump flag affect rendering and cues only — they
/// are never part of synchronized state.
pub struct ReplicaStore {
    mirror: PixelGrid,
    clipboard: PixelGrid,
    pan: Pan,
    view_width: usize,
    view_height: usize,
    short_jump: bool,
    flip_x: bool,
    flip_y: bool,
    members: Vec<String>,
    room_counts: BTreeMap<String, usize>,
}

impl ReplicaStore {
    /// Create a store with a blank full-size mirror and a `view_width` x
    /// `view_height` viewport (clamped to the canvas dimensions).
    #[must_use]
    pub fn new(view_width: usize, view_height: usize) -> Self {
        let view_width = view_width.min(CANVAS_WIDTH);
        let view_height = view_height.min(CANVAS_HEIGHT);
        Self {
            mirror: PixelGrid::new(CANVAS_WIDTH, CANVAS_HEIGHT),
            clipboard: PixelGrid::new(view_width, view_height),
            pan: [0, 0],
            view_width,
            view_height,
            short_jump: false,
            flip_x: false,
            flip_y: false,
            members: Vec::new(),
            room_counts: BTreeMap::new(),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Cell under the viewport at `(x, y)`: the pan offset applies on read.
    /// Returns 0 for anything outside the allocated mirror — a defensive
    /// default for partially initialized state, not an error. A sum that
    /// overflows `i64` is outside the mirror too.
    #[must_use]
    pub fn pixel_at(&self, x: i64, y: i64) -> u8 {
        panned(x, y, self.pan)
            .and_then(|(ax, ay)| self.mirror.get(ax, ay).ok())
            .unwrap_or(0)
    }

    /// Extract a rectangular region at an absolute origin (used by copy).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the region extends outside
    /// the mirror.
    pub fn read_chunk(&self, offset_x: i64, offset_y: i64, width: usize, height: usize) -> Result<PixelGrid, GridError> {
        self.mirror.read_block(offset_x, offset_y, width, height)
    }

    #[must_use]
    pub fn mirror(&self) -> &PixelGrid {
        &self.mirror
    }

    #[must_use]
    pub fn clipboard(&self) -> &PixelGrid {
        &self.clipboard
    }

    #[must_use]
    pub fn pan(&self) -> Pan {
        self.pan
    }

    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    #[must_use]
    pub fn room_counts(&self) -> &BTreeMap<String, usize> {
        &self.room_counts
    }

    // =========================================================================
    // LOCAL EDITS (optimistic apply)
    // =========================================================================

    /// Write one cell and return the outbound edit event. The write lands at
    /// `(x, y)` as given — pan applies on reads only — while the emitted
    /// event carries the current pan so the server resolves absolute
    /// coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `(x, y)` misses the mirror; the
    /// mirror is unchanged and nothing should be sent.
    pub fn set_pixel(&mut self, x: i64, y: i64, value: u8) -> Result<ClientEvent, GridError> {
        self.mirror.set(x, y, value)?;
        Ok(ClientEvent::SetPixel { x, y, pan: self.pan, value })
    }

    /// Materialize a block at an absolute origin, local-only. Used both for
    /// inbound chunk events and as the apply half of local chunk edits.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the block overhangs; the
    /// mirror is unchanged.
    pub fn apply_chunk(&mut self, origin_x: i64, origin_y: i64, block: &PixelGrid) -> Result<(), GridError> {
        self.mirror.apply_block(origin_x, origin_y, block)
    }

    /// Apply a block locally and return the outbound edit event — the
    /// user-action variant of [`ReplicaStore::apply_chunk`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the block overhangs; the
    /// mirror is unchanged and nothing should be sent.
    pub fn apply_chunk_local(&mut self, origin_x: i64, origin_y: i64, block: PixelGrid) -> Result<ClientEvent, GridError> {
        self.mirror.apply_block(origin_x, origin_y, &block)?;
        Ok(ClientEvent::ApplyChunk { origin_x, origin_y, block })
    }

    /// Clear the whole mirror and return the outbound clear request. The
    /// server broadcasts the replacement grid to the *other* members only;
    /// this local reset is the requester's copy of that outcome.
    pub fn clear_canvas(&mut self) -> ClientEvent {
        self.mirror.reset();
        ClientEvent::ClearCanvas
    }

    /// Copy the current viewport region into the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the viewport overhangs the
    /// mirror (cannot happen while the pan clamp holds).
    pub fn copy_selection(&mut self) -> Result<(), GridError> {
        self.clipboard = self
            .mirror
            .read_block(self.pan[0], self.pan[1], self.view_width, self.view_height)?;
        Ok(())
    }

    /// Copy the viewport region into the clipboard, then clear that region
    /// locally and return the all-zero chunk event that clears it on the
    /// server.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the viewport overhangs the
    /// mirror; state is unchanged on error.
    pub fn cut_selection(&mut self) -> Result<ClientEvent, GridError> {
        self.copy_selection()?;
        let blank = PixelGrid::new(self.view_width, self.view_height);
        self.apply_chunk_local(self.pan[0], self.pan[1], blank)
    }

    /// Paste the clipboard at the current pan origin and return the outbound
    /// edit event.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the clipboard overhangs the
    /// mirror at the current pan.
    pub fn paste_clipboard(&mut self) -> Result<ClientEvent, GridError> {
        self.apply_chunk_local(self.pan[0], self.pan[1], self.clipboard.clone())
    }

    // =========================================================================
    // VIEWPORT
    // =========================================================================

    /// Move the viewport. The offset is clamped so the viewport always stays
    /// inside the canvas, even for negative or beyond-bound input. Returns
    /// the navigation cue for the host to play.
    pub fn set_pan(&mut self, x: i64, y: i64) -> Cue {
        self.pan = [
            x.clamp(0, span(self.mirror.width(), self.view_width)),
            y.clamp(0, span(self.mirror.height(), self.view_height)),
        ];
        Cue::Navigate { short: self.short_jump }
    }

    /// Mark whether the next pan jumps are short (changes the cue only).
    pub fn set_short_jump(&mut self, short: bool) {
        self.short_jump = short;
    }

    pub fn toggle_flip_x(&mut self) {
        self.flip_x = !self.flip_x;
    }

    pub fn toggle_flip_y(&mut self) {
        self.flip_y = !self.flip_y;
    }

    #[must_use]
    pub fn flip_x(&self) -> bool {
        self.flip_x
    }

    #[must_use]
    pub fn flip_y(&self) -> bool {
        self.flip_y
    }

    // =========================================================================
    // INBOUND EVENTS
    // =========================================================================

    /// Apply one server event, last-write-wins, no acknowledgment and no
    /// conflict check. Out-of-contract coordinates are dropped silently —
    /// the next full snapshot re-synchronizes. Returns a cue when the event
    /// asks the host to play one.
    pub fn apply_server_event(&mut self, event: ServerEvent) -> Option<Cue> {
        match event {
            ServerEvent::StateSnapshot { grid, members } => {
                self.mirror = grid;
                self.members = members;
                None
            }
            ServerEvent::UpdateFullGrid { grid } => {
                self.mirror = grid;
                None
            }
            ServerEvent::UpdatePixel { x, y, pan, value } => {
                if let Some((ax, ay)) = panned(x, y, pan) {
                    let _ = self.mirror.set(ax, ay, value);
                }
                None
            }
            ServerEvent::UpdateChunk { origin_x, origin_y, block } => {
                let _ = self.mirror.apply_block(origin_x, origin_y, &block);
                None
            }
            ServerEvent::MemberList { members } => {
                self.members = members;
                None
            }
            ServerEvent::RoomCounts { counts } => {
                self.room_counts = counts;
                None
            }
            ServerEvent::SoundEffect { key } => Some(Cue::Sound(key)),
        }
    }
}

/// Largest valid pan offset along one axis.
fn span(canvas: usize, view: usize) -> i64 {
    i64::try_from(canvas.saturating_sub(view)).unwrap_or(i64::MAX)
}

/// Absolute coordinates for `(x, y)` under `pan`. `None` when the sum
/// overflows, which no in-bounds coordinate ever does.
fn panned(x: i64, y: i64, pan: Pan) -> Option<(i64, i64)> {
    Some((x.checked_add(pan[0])?, y.checked_add(pan[1])?))
}
