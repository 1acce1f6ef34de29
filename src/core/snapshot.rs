//! Serializable view of one player's simulation, published to opponents
//! and spectators.

use serde::{Deserialize, Serialize};

use crate::types::{EndReason, PieceKind, BOARD_HEIGHT, BOARD_WIDTH};

use super::pieces::Shape;

/// The falling piece as seen by a remote viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PieceSnapshot {
    pub kind: PieceKind,
    pub shape: Shape,
    pub x: i8,
    pub y: i8,
}

/// Full state of one player's field at a point in time.
///
/// `board` holds the locked stack only (0 = empty, 1..=7 piece colors,
/// 8 = garbage); the active piece travels separately so viewers can render
/// it without re-deriving occupancy. `revision` increases on every state
/// change and lets receivers drop stale or duplicate snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub board: [[u8; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize],
    pub active: Option<PieceSnapshot>,
    /// Ghost landing row of the active piece, when the rule set enables it.
    pub ghost_y: Option<i8>,
    pub next: Option<PieceKind>,
    pub hold: Option<PieceKind>,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub tetrises: u32,
    pub alive: bool,
    pub end_reason: Option<EndReason>,
    pub revision: u64,
    pub updated_ms: u64,
}

impl PlayerSnapshot {
    pub fn empty() -> Self {
        Self {
            board: [[0; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize],
            active: None,
            ghost_y: None,
            next: None,
            hold: None,
            score: 0,
            level: 1,
            lines: 0,
            tetrises: 0,
            alive: true,
            end_reason: None,
            revision: 0,
            updated_ms: 0,
        }
    }
}
