//! Shared types and constants for the match engine.
//!
//! Pure data only: piece kinds, cell tags, commands, and end reasons.
//! Everything here is serde-serializable so the surrounding application can
//! move it over whatever transport it chooses.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Board dimensions (constant for the lifetime of a match).
pub const BOARD_WIDTH: u8 = 10;
pub const BOARD_HEIGHT: u8 = 20;

/// Spawn anchor for new pieces: horizontally centered, top row.
pub const SPAWN_X: i8 = (BOARD_WIDTH / 2) as i8 - 1;
pub const SPAWN_Y: i8 = 0;

/// Gravity timing (milliseconds).
pub const BASE_DROP_MS: u32 = 1000;
pub const DROP_FLOOR_MS: u32 = 30;
pub const SOFT_DROP_FLOOR_MS: u32 = 10;
/// Linear decay of the built-in Standard rule: 30ms per level above 1,
/// never reducing past 32 steps.
pub const LINEAR_DECAY_STEP_MS: u32 = 30;
pub const LINEAR_DECAY_STEP_CAP: u32 = 32;
/// Soft-drop multiplier applied when a rule set leaves it unspecified.
pub const DEFAULT_SOFT_DROP_MULTIPLIER: f64 = 0.05;

/// Minimum interval between two snapshot pushes for one player.
pub const SNAPSHOT_MIN_INTERVAL_MS: u64 = 100;

/// Wall time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The 7 canonical piece kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::J,
        PieceKind::L,
        PieceKind::O,
        PieceKind::S,
        PieceKind::T,
        PieceKind::Z,
    ];

    /// Parse piece kind from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "i" => Some(PieceKind::I),
            "j" => Some(PieceKind::J),
            "l" => Some(PieceKind::L),
            "o" => Some(PieceKind::O),
            "s" => Some(PieceKind::S),
            "t" => Some(PieceKind::T),
            "z" => Some(PieceKind::Z),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::I => "i",
            PieceKind::J => "j",
            PieceKind::L => "l",
            PieceKind::O => "o",
            PieceKind::S => "s",
            PieceKind::T => "t",
            PieceKind::Z => "z",
        }
    }
}

/// Occupied-cell tag. Occupancy is the only fact the engine reads; the tag
/// exists so rendering collaborators can color cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellTag {
    Piece(PieceKind),
    Garbage,
}

impl CellTag {
    /// Stable u8 encoding used by snapshots (0 is reserved for empty).
    pub fn as_u8(&self) -> u8 {
        match self {
            CellTag::Piece(PieceKind::I) => 1,
            CellTag::Piece(PieceKind::J) => 2,
            CellTag::Piece(PieceKind::L) => 3,
            CellTag::Piece(PieceKind::O) => 4,
            CellTag::Piece(PieceKind::S) => 5,
            CellTag::Piece(PieceKind::Z) => 6,
            CellTag::Piece(PieceKind::T) => 7,
            CellTag::Garbage => 8,
        }
    }
}

/// Cell on the board (None = empty).
pub type Cell = Option<CellTag>;

/// Discrete commands consumed by a player's simulation.
///
/// Commands are safe to deliver while the match is not playing: every
/// command except `Leave` is ignored outside the `Playing` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchCommand {
    MoveLeft,
    MoveRight,
    SoftDropStart,
    SoftDropStop,
    Rotate,
    HardDrop,
    Hold,
    PauseToggle,
    Surrender,
    Leave,
}

impl MatchCommand {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "move-left" => Some(MatchCommand::MoveLeft),
            "move-right" => Some(MatchCommand::MoveRight),
            "soft-drop-start" => Some(MatchCommand::SoftDropStart),
            "soft-drop-stop" => Some(MatchCommand::SoftDropStop),
            "rotate" => Some(MatchCommand::Rotate),
            "hard-drop" => Some(MatchCommand::HardDrop),
            "hold" => Some(MatchCommand::Hold),
            "pause-toggle" => Some(MatchCommand::PauseToggle),
            "surrender" => Some(MatchCommand::Surrender),
            "leave" => Some(MatchCommand::Leave),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchCommand::MoveLeft => "move-left",
            MatchCommand::MoveRight => "move-right",
            MatchCommand::SoftDropStart => "soft-drop-start",
            MatchCommand::SoftDropStop => "soft-drop-stop",
            MatchCommand::Rotate => "rotate",
            MatchCommand::HardDrop => "hard-drop",
            MatchCommand::Hold => "hold",
            MatchCommand::PauseToggle => "pause-toggle",
            MatchCommand::Surrender => "surrender",
            MatchCommand::Leave => "leave",
        }
    }
}

/// Why a match (or one player's run) ended. Terminal states are data, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    ToppedOut,
    Surrendered,
    OpponentDisconnected,
    AllDisconnected,
    TimeLimitReached,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::ToppedOut => "topped-out",
            EndReason::Surrendered => "surrendered",
            EndReason::OpponentDisconnected => "opponent-disconnected",
            EndReason::AllDisconnected => "all-disconnected",
            EndReason::TimeLimitReached => "time-limit-reached",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_anchor_centered() {
        assert_eq!(SPAWN_X, 4);
        assert_eq!(SPAWN_Y, 0);
    }

    #[test]
    fn test_command_round_trip() {
        for cmd in [
            MatchCommand::MoveLeft,
            MatchCommand::MoveRight,
            MatchCommand::SoftDropStart,
            MatchCommand::SoftDropStop,
            MatchCommand::Rotate,
            MatchCommand::HardDrop,
            MatchCommand::Hold,
            MatchCommand::PauseToggle,
            MatchCommand::Surrender,
            MatchCommand::Leave,
        ] {
            assert_eq!(MatchCommand::from_str(cmd.as_str()), Some(cmd));
        }
        assert_eq!(MatchCommand::from_str("warp"), None);
    }

    #[test]
    fn test_piece_kind_round_trip() {
        for kind in PieceKind::ALL {
            assert_eq!(PieceKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(PieceKind::from_str("x"), None);
    }

    #[test]
    fn test_cell_tag_encoding_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in PieceKind::ALL {
            assert!(seen.insert(CellTag::Piece(kind).as_u8()));
        }
        assert!(seen.insert(CellTag::Garbage.as_u8()));
        assert!(!seen.contains(&0));
    }
}
