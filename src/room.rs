//! Room and match records: the lobby-facing state that outlives any single
//! simulation task.

use serde::{Deserialize, Serialize};

use crate::types::EndReason;

pub type RoomId = u64;
pub type PlayerId = u64;
pub type RuleSetId = u64;

/// Lifecycle of a room. Transitions only move forward: waiting rooms start
/// playing or are torn down, playing rooms finish, finished rooms never
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(&self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Waiting, RoomStatus::Playing)
                | (RoomStatus::Waiting, RoomStatus::Finished)
                | (RoomStatus::Playing, RoomStatus::Finished)
        )
    }
}

/// A lobby room holding up to `max_players` seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub max_players: u8,
    pub current_players: u8,
    /// None means the built-in Standard rule set.
    pub rule_set_id: Option<RuleSetId>,
    pub created_ms: u64,
    pub updated_ms: u64,
    pub started_ms: Option<u64>,
}

impl Room {
    pub fn is_joinable(&self) -> bool {
        self.status == RoomStatus::Waiting && self.current_players < self.max_players
    }
}

/// Persisted per-player state within a room, refreshed as the match runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub name: String,
    /// Seat index within the room, 0-based.
    pub seat: u8,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub tetrises: u32,
    pub alive: bool,
    pub updated_ms: u64,
}

/// Final standing of one player in a completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFinal {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: u8,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub tetrises: u32,
}

/// Outcome of a finished match. Written exactly once per room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub room_id: RoomId,
    /// None on a draw (e.g. time limit with tied scores).
    pub winner: Option<PlayerId>,
    pub reason: EndReason,
    pub players: Vec<PlayerFinal>,
    pub duration_ms: Option<u64>,
    pub created_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_forward_only() {
        use RoomStatus::*;
        assert!(Waiting.can_transition_to(Playing));
        assert!(Waiting.can_transition_to(Finished));
        assert!(Playing.can_transition_to(Finished));

        assert!(!Playing.can_transition_to(Waiting));
        assert!(!Finished.can_transition_to(Playing));
        assert!(!Finished.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Waiting));
    }

    #[test]
    fn test_room_joinable() {
        let mut room = Room {
            id: 1,
            name: "r".to_string(),
            status: RoomStatus::Waiting,
            max_players: 2,
            current_players: 1,
            rule_set_id: None,
            created_ms: 0,
            updated_ms: 0,
            started_ms: None,
        };
        assert!(room.is_joinable());

        room.current_players = 2;
        assert!(!room.is_joinable());

        room.current_players = 1;
        room.status = RoomStatus::Playing;
        assert!(!room.is_joinable());
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoomStatus::Waiting).unwrap(),
            "\"waiting\""
        );
        let s: RoomStatus = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(s, RoomStatus::Finished);
    }
}
