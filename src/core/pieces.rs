//! Piece shapes and rotation.
//!
//! Shapes are small filled/empty matrices (I is 1x4, O is 2x2, the rest are
//! 2x3). A clockwise rotation is transpose-then-row-reverse, so the matrix
//! dimensions swap. Rotation is attempted at the current anchor first, then
//! through a fixed ordered list of kick offsets; if every candidate collides
//! the rotation is rejected and the piece is unchanged.
//!
//! This is a deliberately simplified kick table, not guideline SRS.

use serde::{Deserialize, Serialize};

use crate::types::PieceKind;

/// Maximum extent of a shape matrix along either axis.
pub const SHAPE_MAX: usize = 4;

/// Kick offsets tried in order when a rotation collides in place.
/// `(0, 0)` is the in-place attempt itself.
pub const KICK_OFFSETS: [(i8, i8); 6] = [(0, 0), (-1, 0), (1, 0), (0, -1), (-1, -1), (1, -1)];

/// A piece's shape matrix: `height` rows by `width` columns of filled cells,
/// stored in a fixed 4x4 grid so shapes are `Copy` and allocation-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    width: u8,
    height: u8,
    cells: [[bool; SHAPE_MAX]; SHAPE_MAX],
}

impl Shape {
    /// Spawn-orientation shape for a piece kind.
    pub fn of(kind: PieceKind) -> Self {
        match kind {
            PieceKind::I => Self::from_rows(&[&[true, true, true, true]]),
            PieceKind::J => Self::from_rows(&[&[true, false, false], &[true, true, true]]),
            PieceKind::L => Self::from_rows(&[&[false, false, true], &[true, true, true]]),
            PieceKind::O => Self::from_rows(&[&[true, true], &[true, true]]),
            PieceKind::S => Self::from_rows(&[&[false, true, true], &[true, true, false]]),
            PieceKind::T => Self::from_rows(&[&[false, true, false], &[true, true, true]]),
            PieceKind::Z => Self::from_rows(&[&[true, true, false], &[false, true, true]]),
        }
    }

    fn from_rows(rows: &[&[bool]]) -> Self {
        let height = rows.len();
        let width = rows[0].len();
        debug_assert!(height <= SHAPE_MAX && width <= SHAPE_MAX);

        let mut cells = [[false; SHAPE_MAX]; SHAPE_MAX];
        for (y, row) in rows.iter().enumerate() {
            debug_assert_eq!(row.len(), width);
            cells[y][..width].copy_from_slice(row);
        }
        Self {
            width: width as u8,
            height: height as u8,
            cells,
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// Whether the cell at (col, row) within the matrix is filled.
    /// Out-of-matrix coordinates read as empty.
    pub fn is_filled(&self, col: u8, row: u8) -> bool {
        if col >= self.width || row >= self.height {
            return false;
        }
        self.cells[row as usize][col as usize]
    }

    /// Iterate over filled cells as (dx, dy) offsets from the anchor.
    pub fn filled_cells(&self) -> impl Iterator<Item = (i8, i8)> + '_ {
        (0..self.height).flat_map(move |row| {
            (0..self.width).filter_map(move |col| {
                if self.cells[row as usize][col as usize] {
                    Some((col as i8, row as i8))
                } else {
                    None
                }
            })
        })
    }

    /// 90-degree clockwise rotation: transpose then reverse each row.
    /// A `h x w` matrix becomes `w x h`.
    pub fn rotated_cw(&self) -> Self {
        let mut cells = [[false; SHAPE_MAX]; SHAPE_MAX];
        let (w, h) = (self.width as usize, self.height as usize);
        for row in 0..w {
            for col in 0..h {
                // new[row][col] = old[h - 1 - col][row]
                cells[row][col] = self.cells[h - 1 - col][row];
            }
        }
        Self {
            width: self.height,
            height: self.width,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_shape_dimensions() {
        assert_eq!(Shape::of(PieceKind::I).width(), 4);
        assert_eq!(Shape::of(PieceKind::I).height(), 1);
        assert_eq!(Shape::of(PieceKind::O).width(), 2);
        assert_eq!(Shape::of(PieceKind::O).height(), 2);
        for kind in [
            PieceKind::J,
            PieceKind::L,
            PieceKind::S,
            PieceKind::T,
            PieceKind::Z,
        ] {
            assert_eq!(Shape::of(kind).width(), 3);
            assert_eq!(Shape::of(kind).height(), 2);
        }
    }

    #[test]
    fn test_every_shape_has_four_cells() {
        for kind in PieceKind::ALL {
            assert_eq!(Shape::of(kind).filled_cells().count(), 4, "{:?}", kind);
        }
    }

    #[test]
    fn test_i_rotation_swaps_axes() {
        let horizontal = Shape::of(PieceKind::I);
        let vertical = horizontal.rotated_cw();
        assert_eq!(vertical.width(), 1);
        assert_eq!(vertical.height(), 4);
        for row in 0..4 {
            assert!(vertical.is_filled(0, row));
        }
    }

    #[test]
    fn test_i_closed_under_two_rotations() {
        let horizontal = Shape::of(PieceKind::I);
        let back = horizontal.rotated_cw().rotated_cw();
        assert_eq!(back, horizontal);
    }

    #[test]
    fn test_all_shapes_closed_under_four_rotations() {
        for kind in PieceKind::ALL {
            let shape = Shape::of(kind);
            let rotated = shape
                .rotated_cw()
                .rotated_cw()
                .rotated_cw()
                .rotated_cw();
            assert_eq!(rotated, shape, "{:?}", kind);
        }
    }

    #[test]
    fn test_t_rotation_orientation() {
        //  . x .        x .
        //  x x x   ->   x x
        //               x .
        let t = Shape::of(PieceKind::T).rotated_cw();
        assert_eq!(t.width(), 2);
        assert_eq!(t.height(), 3);
        assert!(t.is_filled(0, 0));
        assert!(!t.is_filled(1, 0));
        assert!(t.is_filled(0, 1));
        assert!(t.is_filled(1, 1));
        assert!(t.is_filled(0, 2));
        assert!(!t.is_filled(1, 2));
    }

    #[test]
    fn test_kick_offsets_order() {
        assert_eq!(KICK_OFFSETS[0], (0, 0));
        assert_eq!(KICK_OFFSETS[1], (-1, 0));
        assert_eq!(KICK_OFFSETS[5], (1, -1));
    }
}
