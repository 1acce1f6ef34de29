//! Match coordination: room lifecycle from the lobby through arbitration
//! of the final result.
//!
//! The coordinator is the entry point for everything outside a running
//! session: creating and listing rooms, seating players, starting a match
//! (which spawns one session task per player), and reading results.
//! Result arbitration is shared with the sessions through `finalize`,
//! which uses the store's compare-and-set status transition as its gate so
//! that exactly one caller records the result no matter how many race.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::core::SimpleRng;
use crate::room::{MatchResult, PlayerFinal, PlayerId, PlayerRecord, Room, RoomId, RoomStatus};
use crate::rules::{RuleError, RuleSet};
use crate::session::{spawn_session, SessionConfig, SessionHandle};
use crate::store::{MatchStore, StoreError};
use crate::sync::{BroadcastBus, BusEvent, EventBus};
use crate::types::{now_ms, EndReason};

/// Seats per room. Matches are strictly head-to-head.
pub const ROOM_SEATS: u8 = 2;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("room {0} is not accepting a match start")]
    NotWaiting(RoomId),
    #[error("room {0} needs two seated players to start")]
    NotEnoughPlayers(RoomId),
}

/// Front door for rooms and matches over a storage backend and event bus.
pub struct MatchCoordinator<S, B = BroadcastBus> {
    store: Arc<S>,
    bus: B,
}

impl<S: MatchStore> MatchCoordinator<S, BroadcastBus> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            bus: BroadcastBus::default(),
        }
    }
}

impl<S: MatchStore, B: EventBus> MatchCoordinator<S, B> {
    pub fn with_bus(store: Arc<S>, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Create a waiting room. `rules` of None selects the Standard rule
    /// set; custom rules are validated and persisted first.
    pub async fn create_room(
        &self,
        name: &str,
        rules: Option<RuleSet>,
    ) -> Result<Room, RoomError> {
        let rule_set_id = match rules {
            Some(rules) => {
                rules.validate()?;
                Some(self.store.create_rule_set(rules).await?)
            }
            None => None,
        };
        let room = self
            .store
            .create_room(name.to_string(), ROOM_SEATS, rule_set_id, now_ms())
            .await?;
        info!(room = room.id, name = %room.name, "room created");
        self.bus.publish(BusEvent::RoomListChanged);
        Ok(room)
    }

    /// Rooms currently accepting players.
    pub async fn rooms(&self) -> Result<Vec<Room>, RoomError> {
        Ok(self.store.rooms_waiting().await?)
    }

    pub async fn room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        Ok(self.store.room(room_id).await?)
    }

    /// Seat a player in a waiting room.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        player_name: &str,
    ) -> Result<PlayerRecord, RoomError> {
        let player = self
            .store
            .seat_player(room_id, player_name.to_string(), now_ms())
            .await?;
        info!(room = room_id, player = player.id, seat = player.seat, "player joined");
        self.bus.publish(BusEvent::RosterChanged { room_id });
        self.bus.publish(BusEvent::RoomListChanged);
        Ok(player)
    }

    /// Leave a room that has not started. The room is torn down when the
    /// last player leaves.
    pub async fn leave_waiting(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        let remaining = self.store.vacate_seat(room_id, player_id, now_ms()).await?;
        self.bus.publish(BusEvent::RosterChanged { room_id });
        if remaining == 0 {
            self.store.delete_room(room_id).await?;
            info!(room = room_id, "empty room removed");
        }
        self.bus.publish(BusEvent::RoomListChanged);
        Ok(())
    }

    /// Start the match with time-derived piece seeds.
    pub async fn start_match(&self, room_id: RoomId) -> Result<Vec<SessionHandle>, RoomError> {
        let mut rng = SimpleRng::new((now_ms() as u32) ^ (room_id as u32).rotate_left(16));
        self.start_match_seeded(room_id, [rng.next_u32(), rng.next_u32()])
            .await
    }

    /// Start the match with explicit piece seeds (deterministic replays
    /// and tests). Requires a full room in `Waiting`; the status CAS makes
    /// a concurrent duplicate start a clean failure.
    pub async fn start_match_seeded(
        &self,
        room_id: RoomId,
        seeds: [u32; 2],
    ) -> Result<Vec<SessionHandle>, RoomError> {
        let room = self.store.room(room_id).await?;
        let players = self.store.players_in_room(room_id).await?;
        if players.len() < ROOM_SEATS as usize {
            return Err(RoomError::NotEnoughPlayers(room_id));
        }

        let rules = Arc::new(match room.rule_set_id {
            Some(id) => self.store.rule_set(id).await?,
            None => RuleSet::standard(),
        });

        let started_ms = now_ms();
        if !self
            .store
            .compare_and_set_status(room_id, RoomStatus::Waiting, RoomStatus::Playing, started_ms)
            .await?
        {
            return Err(RoomError::NotWaiting(room_id));
        }
        info!(room = room_id, rules = %rules.name, "match started");
        self.bus.publish(BusEvent::RoomStatusChanged {
            room_id,
            status: RoomStatus::Playing,
        });
        self.bus.publish(BusEvent::RoomListChanged);

        let mut handles = Vec::with_capacity(2);
        for (i, player) in players.iter().take(2).enumerate() {
            let opponent = &players[1 - i];
            let config = SessionConfig {
                room_id,
                player: player.clone(),
                opponent_id: opponent.id,
                opponent_seat: opponent.seat,
                rules: rules.clone(),
                seed: seeds[i],
                started_ms,
            };
            handles.push(spawn_session(self.store.clone(), self.bus.clone(), config));
        }
        Ok(handles)
    }

    /// The recorded result for a room, if the match has finished.
    pub async fn result(&self, room_id: RoomId) -> Result<Option<MatchResult>, RoomError> {
        Ok(self.store.result(room_id).await?)
    }
}

/// Settle a match. The status CAS into `Finished` is the arbitration
/// gate: whoever wins it writes the result, everyone else gets Ok(false)
/// and changes nothing. Safe to call from any number of racing sessions.
///
/// When the clock ended the match the caller's `winner` is ignored and
/// the winner is derived from the persisted scores, so two sessions
/// racing on the same deadline cannot record different outcomes.
pub(crate) async fn finalize<S: MatchStore, B: EventBus>(
    store: &S,
    bus: &B,
    room_id: RoomId,
    winner: Option<PlayerId>,
    reason: EndReason,
) -> Result<bool, StoreError> {
    let ended_ms = now_ms();
    let room = store.room(room_id).await?;
    if room.status == RoomStatus::Finished {
        return Ok(false);
    }
    if !store
        .compare_and_set_status(room_id, room.status, RoomStatus::Finished, ended_ms)
        .await?
    {
        return Ok(false);
    }

    let players = store.players_in_room(room_id).await?;
    let winner = if reason == EndReason::TimeLimitReached {
        winner_by_score(&players)
    } else {
        winner
    };
    let result = MatchResult {
        room_id,
        winner,
        reason,
        players: players
            .into_iter()
            .map(|p| PlayerFinal {
                player_id: p.id,
                name: p.name,
                seat: p.seat,
                score: p.score,
                level: p.level,
                lines: p.lines,
                tetrises: p.tetrises,
            })
            .collect(),
        duration_ms: room.started_ms.map(|s| ended_ms.saturating_sub(s)),
        created_ms: ended_ms,
    };
    let recorded = store.record_result(result).await?;
    info!(room = room_id, ?winner, reason = reason.as_str(), "match finished");
    bus.publish(BusEvent::ResultRecorded { room_id });
    bus.publish(BusEvent::RoomStatusChanged {
        room_id,
        status: RoomStatus::Finished,
    });
    bus.publish(BusEvent::RoomListChanged);
    Ok(recorded)
}

/// Higher persisted score wins; a tie is a draw.
fn winner_by_score(players: &[PlayerRecord]) -> Option<PlayerId> {
    let (a, b) = match players {
        [a, b] => (a, b),
        _ => return None,
    };
    match a.score.cmp(&b.score) {
        std::cmp::Ordering::Greater => Some(a.id),
        std::cmp::Ordering::Less => Some(b.id),
        std::cmp::Ordering::Equal => None,
    }
}
