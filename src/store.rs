//! Match persistence: rooms, seated players, rule sets, and recorded
//! results behind a storage trait.
//!
//! The trait is async so a networked backend can slot in; the bundled
//! `MemoryStore` keeps everything in a single `RwLock`-guarded map set and
//! is what the coordinator and tests use.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::room::{MatchResult, PlayerId, PlayerRecord, Room, RoomId, RoomStatus, RuleSetId};
use crate::rules::RuleSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("rule set {0} not found")]
    RuleSetNotFound(RuleSetId),
    #[error("room {0} is not joinable")]
    RoomNotJoinable(RoomId),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Live counters pushed from a running simulation into a player's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerProgress {
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub tetrises: u32,
    pub alive: bool,
}

/// Storage backend for rooms, players, rule sets, and match results.
pub trait MatchStore: Send + Sync + 'static {
    fn create_room(
        &self,
        name: String,
        max_players: u8,
        rule_set_id: Option<RuleSetId>,
        now_ms: u64,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    fn room(&self, id: RoomId) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Rooms currently accepting players.
    fn rooms_waiting(&self) -> impl Future<Output = Result<Vec<Room>, StoreError>> + Send;

    /// Atomically move a room from `from` to `to`. Returns false when the
    /// room is not in `from`; callers use this as their idempotence gate.
    /// A transition into `Playing` stamps `started_ms`.
    fn compare_and_set_status(
        &self,
        id: RoomId,
        from: RoomStatus,
        to: RoomStatus,
        now_ms: u64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Seat a player in a waiting room with a free seat. Atomic: the seat
    /// count check and the insert happen under one lock.
    fn seat_player(
        &self,
        room_id: RoomId,
        name: String,
        now_ms: u64,
    ) -> impl Future<Output = Result<PlayerRecord, StoreError>> + Send;

    /// Remove a player from their room. Returns the number of players left.
    fn vacate_seat(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        now_ms: u64,
    ) -> impl Future<Output = Result<u8, StoreError>> + Send;

    fn players_in_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<PlayerRecord>, StoreError>> + Send;

    fn update_player_state(
        &self,
        player_id: PlayerId,
        progress: PlayerProgress,
        now_ms: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn create_rule_set(
        &self,
        rules: RuleSet,
    ) -> impl Future<Output = Result<RuleSetId, StoreError>> + Send;

    fn rule_set(
        &self,
        id: RuleSetId,
    ) -> impl Future<Output = Result<RuleSet, StoreError>> + Send;

    /// Record the final result for a room. Write-once: returns false (and
    /// leaves the stored result untouched) if one already exists.
    fn record_result(
        &self,
        result: MatchResult,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn result(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<MatchResult>, StoreError>> + Send;

    /// Drop a room and everything attached to it.
    fn delete_room(&self, room_id: RoomId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, Room>,
    players: HashMap<PlayerId, PlayerRecord>,
    rule_sets: HashMap<RuleSetId, RuleSet>,
    results: HashMap<RoomId, MatchResult>,
    next_room_id: RoomId,
    next_player_id: PlayerId,
    next_rule_set_id: RuleSetId,
}

impl Inner {
    fn seats_taken(&self, room_id: RoomId) -> Vec<u8> {
        self.players
            .values()
            .filter(|p| p.room_id == room_id)
            .map(|p| p.seat)
            .collect()
    }
}

/// In-memory `MatchStore` backed by a `tokio::sync::RwLock`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStore for MemoryStore {
    async fn create_room(
        &self,
        name: String,
        max_players: u8,
        rule_set_id: Option<RuleSetId>,
        now_ms: u64,
    ) -> Result<Room, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(id) = rule_set_id {
            if !inner.rule_sets.contains_key(&id) {
                return Err(StoreError::RuleSetNotFound(id));
            }
        }
        inner.next_room_id += 1;
        let room = Room {
            id: inner.next_room_id,
            name,
            status: RoomStatus::Waiting,
            max_players,
            current_players: 0,
            rule_set_id,
            created_ms: now_ms,
            updated_ms: now_ms,
            started_ms: None,
        };
        inner.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn room(&self, id: RoomId) -> Result<Room, StoreError> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(&id)
            .cloned()
            .ok_or(StoreError::RoomNotFound(id))
    }

    async fn rooms_waiting(&self) -> Result<Vec<Room>, StoreError> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<Room> = inner
            .rooms
            .values()
            .filter(|r| r.status == RoomStatus::Waiting)
            .cloned()
            .collect();
        rooms.sort_by_key(|r| r.created_ms);
        Ok(rooms)
    }

    async fn compare_and_set_status(
        &self,
        id: RoomId,
        from: RoomStatus,
        to: RoomStatus,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let room = inner.rooms.get_mut(&id).ok_or(StoreError::RoomNotFound(id))?;
        if room.status != from || !from.can_transition_to(to) {
            return Ok(false);
        }
        room.status = to;
        room.updated_ms = now_ms;
        if to == RoomStatus::Playing {
            room.started_ms = Some(now_ms);
        }
        Ok(true)
    }

    async fn seat_player(
        &self,
        room_id: RoomId,
        name: String,
        now_ms: u64,
    ) -> Result<PlayerRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get(&room_id)
            .ok_or(StoreError::RoomNotFound(room_id))?;
        if !room.is_joinable() {
            return Err(StoreError::RoomNotJoinable(room_id));
        }
        let max = room.max_players;

        let taken = inner.seats_taken(room_id);
        let seat = (0..max)
            .find(|s| !taken.contains(s))
            .ok_or(StoreError::RoomNotJoinable(room_id))?;

        inner.next_player_id += 1;
        let player = PlayerRecord {
            id: inner.next_player_id,
            room_id,
            name,
            seat,
            score: 0,
            level: 1,
            lines: 0,
            tetrises: 0,
            alive: true,
            updated_ms: now_ms,
        };
        inner.players.insert(player.id, player.clone());

        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(StoreError::RoomNotFound(room_id))?;
        room.current_players += 1;
        room.updated_ms = now_ms;
        Ok(player)
    }

    async fn vacate_seat(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        now_ms: u64,
    ) -> Result<u8, StoreError> {
        let mut inner = self.inner.write().await;
        let player = inner
            .players
            .remove(&player_id)
            .ok_or(StoreError::PlayerNotFound(player_id))?;
        debug_assert_eq!(player.room_id, room_id);

        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(StoreError::RoomNotFound(room_id))?;
        room.current_players = room.current_players.saturating_sub(1);
        room.updated_ms = now_ms;
        Ok(room.current_players)
    }

    async fn players_in_room(&self, room_id: RoomId) -> Result<Vec<PlayerRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut players: Vec<PlayerRecord> = inner
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect();
        players.sort_by_key(|p| p.seat);
        Ok(players)
    }

    async fn update_player_state(
        &self,
        player_id: PlayerId,
        progress: PlayerProgress,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let player = inner
            .players
            .get_mut(&player_id)
            .ok_or(StoreError::PlayerNotFound(player_id))?;
        player.score = progress.score;
        player.level = progress.level;
        player.lines = progress.lines;
        player.tetrises = progress.tetrises;
        player.alive = progress.alive;
        player.updated_ms = now_ms;
        Ok(())
    }

    async fn create_rule_set(&self, rules: RuleSet) -> Result<RuleSetId, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_rule_set_id += 1;
        let id = inner.next_rule_set_id;
        inner.rule_sets.insert(id, rules);
        Ok(id)
    }

    async fn rule_set(&self, id: RuleSetId) -> Result<RuleSet, StoreError> {
        let inner = self.inner.read().await;
        inner
            .rule_sets
            .get(&id)
            .cloned()
            .ok_or(StoreError::RuleSetNotFound(id))
    }

    async fn record_result(&self, result: MatchResult) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.results.contains_key(&result.room_id) {
            return Ok(false);
        }
        inner.results.insert(result.room_id, result);
        Ok(true)
    }

    async fn result(&self, room_id: RoomId) -> Result<Option<MatchResult>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.results.get(&room_id).cloned())
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.rooms.remove(&room_id);
        inner.players.retain(|_, p| p.room_id != room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndReason;

    #[tokio::test]
    async fn test_create_and_list_rooms() {
        let store = MemoryStore::new();
        let a = store.create_room("a".into(), 2, None, 10).await.unwrap();
        let b = store.create_room("b".into(), 2, None, 20).await.unwrap();
        assert_ne!(a.id, b.id);

        let waiting = store.rooms_waiting().await.unwrap();
        assert_eq!(waiting.len(), 2);
        assert_eq!(waiting[0].id, a.id);
    }

    #[tokio::test]
    async fn test_seat_assignment_and_capacity() {
        let store = MemoryStore::new();
        let room = store.create_room("r".into(), 2, None, 0).await.unwrap();

        let p1 = store.seat_player(room.id, "p1".into(), 1).await.unwrap();
        let p2 = store.seat_player(room.id, "p2".into(), 2).await.unwrap();
        assert_eq!(p1.seat, 0);
        assert_eq!(p2.seat, 1);

        let err = store.seat_player(room.id, "p3".into(), 3).await;
        assert_eq!(err, Err(StoreError::RoomNotJoinable(room.id)));

        // Freeing a seat reopens the room and reuses the lowest seat.
        assert_eq!(store.vacate_seat(room.id, p1.id, 4).await.unwrap(), 1);
        let p3 = store.seat_player(room.id, "p3".into(), 5).await.unwrap();
        assert_eq!(p3.seat, 0);
    }

    #[tokio::test]
    async fn test_cas_status_gate() {
        let store = MemoryStore::new();
        let room = store.create_room("r".into(), 2, None, 0).await.unwrap();

        assert!(store
            .compare_and_set_status(room.id, RoomStatus::Waiting, RoomStatus::Playing, 100)
            .await
            .unwrap());
        // Second attempt from Waiting loses the race.
        assert!(!store
            .compare_and_set_status(room.id, RoomStatus::Waiting, RoomStatus::Playing, 101)
            .await
            .unwrap());
        // Backward transitions never pass.
        assert!(!store
            .compare_and_set_status(room.id, RoomStatus::Playing, RoomStatus::Waiting, 102)
            .await
            .unwrap());

        let room = store.room(room.id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.started_ms, Some(100));
    }

    #[tokio::test]
    async fn test_result_is_write_once() {
        let store = MemoryStore::new();
        let room = store.create_room("r".into(), 2, None, 0).await.unwrap();

        let first = MatchResult {
            room_id: room.id,
            winner: Some(1),
            reason: EndReason::ToppedOut,
            players: vec![],
            duration_ms: Some(5000),
            created_ms: 100,
        };
        assert!(store.record_result(first.clone()).await.unwrap());

        let mut second = first.clone();
        second.winner = Some(2);
        assert!(!store.record_result(second).await.unwrap());

        assert_eq!(store.result(room.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_delete_room_drops_players() {
        let store = MemoryStore::new();
        let room = store.create_room("r".into(), 2, None, 0).await.unwrap();
        let p = store.seat_player(room.id, "p".into(), 1).await.unwrap();

        store.delete_room(room.id).await.unwrap();
        assert_eq!(
            store.room(room.id).await,
            Err(StoreError::RoomNotFound(room.id))
        );
        assert_eq!(
            store.update_player_state(
                p.id,
                PlayerProgress {
                    score: 0,
                    level: 1,
                    lines: 0,
                    tetrises: 0,
                    alive: true
                },
                2
            )
            .await,
            Err(StoreError::PlayerNotFound(p.id))
        );
    }

    #[tokio::test]
    async fn test_rule_set_round_trip() {
        let store = MemoryStore::new();
        let id = store.create_rule_set(RuleSet::standard()).await.unwrap();
        assert_eq!(store.rule_set(id).await.unwrap(), RuleSet::standard());
        assert_eq!(
            store.rule_set(id + 1).await,
            Err(StoreError::RuleSetNotFound(id + 1))
        );

        // Rooms referencing a missing rule set are refused.
        let err = store.create_room("r".into(), 2, Some(id + 1), 0).await;
        assert!(matches!(err, Err(StoreError::RuleSetNotFound(_))));
    }
}
