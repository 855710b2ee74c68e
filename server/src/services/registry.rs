//! Room registry — authoritative canvases for the fixed room set.
//!
//! DESIGN
//! ======
//! The registry exclusively owns one [`PixelGrid`] per known room key. All
//! rooms are pre-registered empty at startup; lookups never create rooms, and
//! an unknown key is a reportable failure rather than undefined behavior.
//! Grids are mutated in place for the life of the process and are only ever
//! handed across the boundary as copies ([`RoomRegistry::snapshot`]).
//!
//! ERROR HANDLING
//! ==============
//! Unknown rooms and out-of-bounds coordinates both surface as
//! [`RegistryError`]. Neither mutates state: the grid validates before
//! writing, so a rejected edit leaves the canvas exactly as it was.

use std::collections::BTreeMap;

use grid::{GridError, PixelGrid};
use protocol::{CANVAS_HEIGHT, CANVAS_WIDTH, ROOM_KEYS};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown room: {0}")]
    UnknownRoom(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

pub struct RoomRegistry {
    rooms: BTreeMap<String, PixelGrid>,
}

impl RoomRegistry {
    /// Create the registry with every fixed room key holding a blank canvas.
    #[must_use]
    pub fn new() -> Self {
        let rooms = ROOM_KEYS
            .iter()
            .map(|key| ((*key).to_owned(), PixelGrid::new(CANVAS_WIDTH, CANVAS_HEIGHT)))
            .collect();
        Self { rooms }
    }

    /// Write one cell of a room's canvas.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRoom`] for an unregistered key and
    /// [`RegistryError::Grid`] for out-of-bounds coordinates.
    pub fn set_pixel(&mut self, room: &str, x: i64, y: i64, value: u8) -> Result<(), RegistryError> {
        let grid = self.grid_mut(room)?;
        grid.set(x, y, value)?;
        Ok(())
    }

    /// Apply a rectangular block to a room's canvas at an absolute origin.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRoom`] for an unregistered key and
    /// [`RegistryError::Grid`] if the block does not fit; a rejected block is
    /// never partially applied.
    pub fn apply_chunk(
        &mut self,
        room: &str,
        origin_x: i64,
        origin_y: i64,
        block: &PixelGrid,
    ) -> Result<(), RegistryError> {
        let grid = self.grid_mut(room)?;
        grid.apply_block(origin_x, origin_y, block)?;
        Ok(())
    }

    /// Reset a room's canvas to all-zero.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRoom`] for an unregistered key.
    pub fn reset(&mut self, room: &str) -> Result<(), RegistryError> {
        let grid = self.grid_mut(room)?;
        grid.reset();
        Ok(())
    }

    /// Read-only copy of a room's canvas, handed to newly joining sessions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRoom`] for an unregistered key.
    pub fn snapshot(&self, room: &str) -> Result<PixelGrid, RegistryError> {
        self.rooms
            .get(room)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRoom(room.to_owned()))
    }

    fn grid_mut(&mut self, room: &str) -> Result<&mut PixelGrid, RegistryError> {
        self.rooms
            .get_mut(room)
            .ok_or_else(|| RegistryError::UnknownRoom(room.to_owned()))
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
