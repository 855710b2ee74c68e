//! Fixed-size pixel grid — the shared canvas data structure.
//!
//! DESIGN
//! ======
//! `PixelGrid` is a bounds-checked 2D buffer of small integer cell values
//! (0 = empty). It is pure data: no locking, no transport concerns. Both the
//! server's authoritative room canvases and the client's mirror, viewport,
//! and clipboard are instances of this one type.
//!
//! Coordinates are taken as `i64` because they arrive off the wire where a
//! pan offset may push them negative; every access validates against
//! `[0, width) × [0, height)` and returns [`GridError`] on violation. Callers
//! at the protocol boundary reject and drop — a bad coordinate never
//! partially mutates a grid.
//!
//! The serde representation is row-major `Vec<Vec<u8>>`, matching the wire
//! shape replicas exchange with the server.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("coordinate ({x}, {y}) outside {width}x{height} grid")]
    OutOfBounds { x: i64, y: i64, width: usize, height: usize },
    #[error(
        "{block_width}x{block_height} block at ({origin_x}, {origin_y}) does not fit {width}x{height} grid"
    )]
    BlockDoesNotFit {
        origin_x: i64,
        origin_y: i64,
        block_width: usize,
        block_height: usize,
        width: usize,
        height: usize,
    },
    #[error("ragged rows: row {row} has {found} cells, expected {expected}")]
    RaggedRows { row: usize, expected: usize, found: usize },
}

// =============================================================================
// PIXEL GRID
// =============================================================================

/// Bounds-checked 2D buffer of cell values. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct PixelGrid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl PixelGrid {
    /// Create a grid with every cell set to 0.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, cells: vec![0; width * height] }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Read one cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `(x, y)` is outside the grid.
    pub fn get(&self, x: i64, y: i64) -> Result<u8, GridError> {
        let idx = self.offset(x, y)?;
        Ok(self.cells[idx])
    }

    /// Write one cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `(x, y)` is outside the grid.
    pub fn set(&mut self, x: i64, y: i64, value: u8) -> Result<(), GridError> {
        let idx = self.offset(x, y)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Copy every cell of `block` into this grid at the given origin.
    ///
    /// Validates that the whole block fits before writing anything, so a bad
    /// origin never leaves a partial edit behind.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if any part of the block would
    /// land outside this grid.
    pub fn apply_block(&mut self, origin_x: i64, origin_y: i64, block: &PixelGrid) -> Result<(), GridError> {
        let (ox, oy) = self.block_origin(origin_x, origin_y, block.width, block.height)?;
        for row in 0..block.height {
            let src = row * block.width;
            let dst = (oy + row) * self.width + ox;
            self.cells[dst..dst + block.width].copy_from_slice(&block.cells[src..src + block.width]);
        }
        Ok(())
    }

    /// Extract a `width`x`height` copy of the region at the given origin.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BlockDoesNotFit`] if the region extends outside
    /// this grid.
    pub fn read_block(&self, origin_x: i64, origin_y: i64, width: usize, height: usize) -> Result<PixelGrid, GridError> {
        let (ox, oy) = self.block_origin(origin_x, origin_y, width, height)?;
        let mut out = PixelGrid::new(width, height);
        for row in 0..height {
            let src = (oy + row) * self.width + ox;
            let dst = row * width;
            out.cells[dst..dst + width].copy_from_slice(&self.cells[src..src + width]);
        }
        Ok(out)
    }

    /// Set every cell back to 0.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// True if every cell is 0.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// Iterate rows as slices, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Flat index for `(x, y)`, or an error when out of bounds.
    fn offset(&self, x: i64, y: i64) -> Result<usize, GridError> {
        let oob = GridError::OutOfBounds { x, y, width: self.width, height: self.height };
        let ux = usize::try_from(x).map_err(|_| oob.clone())?;
        let uy = usize::try_from(y).map_err(|_| oob.clone())?;
        if ux >= self.width || uy >= self.height {
            return Err(oob);
        }
        Ok(uy * self.width + ux)
    }

    /// Validate a `bw`x`bh` region at `(origin_x, origin_y)` and return the
    /// origin as unsigned indices.
    fn block_origin(&self, origin_x: i64, origin_y: i64, bw: usize, bh: usize) -> Result<(usize, usize), GridError> {
        let err = GridError::BlockDoesNotFit {
            origin_x,
            origin_y,
            block_width: bw,
            block_height: bh,
            width: self.width,
            height: self.height,
        };
        let ox = usize::try_from(origin_x).map_err(|_| err.clone())?;
        let oy = usize::try_from(origin_y).map_err(|_| err.clone())?;
        if ox + bw > self.width || oy + bh > self.height {
            return Err(err);
        }
        Ok((ox, oy))
    }
}

// =============================================================================
// WIRE REPRESENTATION
// =============================================================================

impl TryFrom<Vec<Vec<u8>>> for PixelGrid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);
        for (row, cols) in rows.iter().enumerate() {
            if cols.len() != width {
                return Err(GridError::RaggedRows { row, expected: width, found: cols.len() });
            }
            cells.extend_from_slice(cols);
        }
        Ok(Self { width, height, cells })
    }
}

impl From<PixelGrid> for Vec<Vec<u8>> {
    fn from(grid: PixelGrid) -> Self {
        grid.rows().map(<[u8]>::to_vec).collect()
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
