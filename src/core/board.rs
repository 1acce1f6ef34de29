//! Board module - the 10x20 occupancy grid for one player.
//!
//! Uses a flat array for cache locality and zero-allocation clears.
//! Coordinates: (x, y) with x in 0..10 left to right and y in 0..20 top to
//! bottom. A falling piece's anchor may sit above the board (y < 0); rows
//! above the board are never checked against content, only against bounds.

use crate::core::pieces::Shape;
use crate::types::{Cell, CellTag, BOARD_HEIGHT, BOARD_WIDTH};

/// Total number of cells on the board.
const BOARD_SIZE: usize = (BOARD_WIDTH as usize) * (BOARD_HEIGHT as usize);

/// The game board - 10 columns x 20 rows, flat row-major storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [None; BOARD_SIZE],
        }
    }

    #[inline(always)]
    fn index(x: i8, y: i8) -> Option<usize> {
        if x < 0 || x >= BOARD_WIDTH as i8 || y < 0 || y >= BOARD_HEIGHT as i8 {
            return None;
        }
        Some((y as usize) * (BOARD_WIDTH as usize) + (x as usize))
    }

    pub fn width(&self) -> u8 {
        BOARD_WIDTH
    }

    pub fn height(&self) -> u8 {
        BOARD_HEIGHT
    }

    /// Get cell at (x, y). Returns None if out of bounds.
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        Self::index(x, y).map(|idx| self.cells[idx])
    }

    /// Set cell at (x, y). Returns false if out of bounds.
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        match Self::index(x, y) {
            Some(idx) => {
                self.cells[idx] = cell;
                true
            }
            None => false,
        }
    }

    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(Some(_)))
    }

    /// Collision test for a shape placed with its anchor at (x, y).
    ///
    /// True if any filled cell of the shape leaves `[0, width)` horizontally,
    /// reaches `>= height`, or overlaps an occupied board cell. Cells with a
    /// board row below 0 are only bounds-checked horizontally: content above
    /// the board cannot collide until it enters it.
    pub fn collides(&self, x: i8, y: i8, shape: &Shape) -> bool {
        for (dx, dy) in shape.filled_cells() {
            let nx = x + dx;
            let ny = y + dy;

            if nx < 0 || nx >= BOARD_WIDTH as i8 || ny >= BOARD_HEIGHT as i8 {
                return true;
            }
            if ny >= 0 && self.is_occupied(nx, ny) {
                return true;
            }
        }
        false
    }

    /// Write a shape's filled cells into the board at (x, y).
    ///
    /// Only called after a non-colliding final position has been
    /// established, so an out-of-range cell here is a programming bug.
    /// Cells still above the top row are skipped; the following spawn check
    /// detects the top-out.
    pub fn lock(&mut self, x: i8, y: i8, shape: &Shape, tag: CellTag) {
        for (dx, dy) in shape.filled_cells() {
            let nx = x + dx;
            let ny = y + dy;
            if ny < 0 {
                continue;
            }
            debug_assert!(
                nx >= 0 && nx < BOARD_WIDTH as i8 && ny < BOARD_HEIGHT as i8,
                "lock out of bounds at ({nx}, {ny})"
            );
            self.set(nx, ny, Some(tag));
        }
    }

    /// Check if a row is completely filled.
    pub fn is_row_full(&self, y: usize) -> bool {
        if y >= BOARD_HEIGHT as usize {
            return false;
        }
        let start = y * BOARD_WIDTH as usize;
        let end = start + BOARD_WIDTH as usize;
        self.cells[start..end].iter().all(|cell| cell.is_some())
    }

    /// Check if a row has no occupied cells.
    pub fn is_row_empty(&self, y: usize) -> bool {
        if y >= BOARD_HEIGHT as usize {
            return true;
        }
        let start = y * BOARD_WIDTH as usize;
        let end = start + BOARD_WIDTH as usize;
        self.cells[start..end].iter().all(|cell| cell.is_none())
    }

    /// Remove every fully-occupied row, insert that many empty rows at the
    /// top, and preserve the relative order of surviving rows.
    ///
    /// Returns the number of rows removed. Two-pointer compaction with no
    /// allocation; a no-op on boards with no full row.
    pub fn clear_full_rows(&mut self) -> u8 {
        let width = BOARD_WIDTH as usize;
        let mut cleared: u8 = 0;
        let mut write_y = BOARD_HEIGHT as usize;

        for read_y in (0..BOARD_HEIGHT as usize).rev() {
            if self.is_row_full(read_y) {
                cleared += 1;
            } else {
                write_y -= 1;
                if write_y != read_y {
                    let src_start = read_y * width;
                    let dst_start = write_y * width;
                    self.cells
                        .copy_within(src_start..src_start + width, dst_start);
                }
            }
        }

        for cell in &mut self.cells[..write_y * width] {
            *cell = None;
        }

        cleared
    }

    /// Insert garbage rows at the bottom, shifting existing rows upward.
    ///
    /// Each entry in `holes` produces one full garbage row with a single
    /// empty cell at that column. Rows shifted above row 0 are discarded;
    /// returns true if any discarded row was non-empty (the receiver has
    /// topped out). Only called between a lock and the next spawn.
    pub fn insert_garbage_rows(&mut self, holes: &[u8]) -> bool {
        if holes.is_empty() {
            return false;
        }

        let width = BOARD_WIDTH as usize;
        let height = BOARD_HEIGHT as usize;
        let count = holes.len().min(height);

        let mut overflowed = false;
        for y in 0..count {
            if !self.is_row_empty(y) {
                overflowed = true;
                break;
            }
        }

        // Shift surviving rows up by `count`.
        self.cells.copy_within(count * width.., 0);

        for (i, &hole) in holes.iter().take(count).enumerate() {
            let y = height - count + i;
            let start = y * width;
            for x in 0..width {
                self.cells[start + x] = if x as u8 == hole {
                    None
                } else {
                    Some(CellTag::Garbage)
                };
            }
        }

        overflowed
    }

    /// Write the board as a u8 grid (0 = empty) for snapshots.
    pub fn write_u8_grid(&self, out: &mut [[u8; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize]) {
        for y in 0..BOARD_HEIGHT as usize {
            for x in 0..BOARD_WIDTH as usize {
                out[y][x] = self.cells[y * BOARD_WIDTH as usize + x]
                    .map(|tag| tag.as_u8())
                    .unwrap_or(0);
            }
        }
    }

    /// Fill a full row except one column (test helper).
    #[cfg(test)]
    pub fn fill_row_except(&mut self, y: i8, hole: i8, tag: CellTag) {
        for x in 0..BOARD_WIDTH as i8 {
            if x != hole {
                self.set(x, y, Some(tag));
            }
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
