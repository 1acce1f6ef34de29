//! State synchronization between players: the in-process event bus,
//! snapshot publishing with throttling, and the opponent-side mirror that
//! deduplicates what arrives.
//!
//! Delivery is at-least-once and unordered bursts are possible, so every
//! snapshot carries a revision and receivers drop anything stale. A 100ms
//! publish throttle bounds traffic; terminal states bypass it so a death
//! is never delayed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::core::{PlayerSim, PlayerSnapshot};
use crate::room::{RoomId, RoomStatus};
use crate::types::SNAPSHOT_MIN_INTERVAL_MS;

/// Events flowing between sessions, the coordinator, and any lobby
/// observers.
#[derive(Debug, Clone)]
pub enum BusEvent {
    RoomListChanged,
    RosterChanged {
        room_id: RoomId,
    },
    RoomStatusChanged {
        room_id: RoomId,
        status: RoomStatus,
    },
    SnapshotPushed {
        room_id: RoomId,
        seat: u8,
        snapshot: Arc<PlayerSnapshot>,
    },
    GarbageSent {
        room_id: RoomId,
        from_seat: u8,
        rows: u8,
    },
    ResultRecorded {
        room_id: RoomId,
    },
}

/// Fan-out event channel. Cloneable handles publish; every subscriber gets
/// every event published after it subscribed.
pub trait EventBus: Clone + Send + Sync + 'static {
    fn publish(&self, event: BusEvent);
    fn subscribe(&self) -> broadcast::Receiver<BusEvent>;
}

/// `EventBus` on top of `tokio::sync::broadcast`.
#[derive(Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<BusEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: BusEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

/// Outbound side of snapshot sync for one player. Skips publishes that
/// carry nothing new and rate-limits the rest.
pub struct SnapshotPublisher {
    room_id: RoomId,
    seat: u8,
    last_revision: Option<u64>,
    last_sent_ms: u64,
}

impl SnapshotPublisher {
    pub fn new(room_id: RoomId, seat: u8) -> Self {
        Self {
            room_id,
            seat,
            last_revision: None,
            last_sent_ms: 0,
        }
    }

    /// Publish the simulation's current snapshot if it is new and the
    /// throttle window has passed. `force` bypasses the throttle for
    /// terminal states. Returns true when a snapshot went out.
    pub fn publish<B: EventBus>(
        &mut self,
        bus: &B,
        sim: &PlayerSim,
        now_ms: u64,
        force: bool,
    ) -> bool {
        let revision = sim.revision();
        if self.last_revision == Some(revision) && !force {
            return false;
        }
        // Nothing sent yet always goes out regardless of the window.
        if self.last_revision.is_some()
            && !force
            && now_ms < self.last_sent_ms + SNAPSHOT_MIN_INTERVAL_MS
        {
            return false;
        }

        let snapshot = Arc::new(sim.snapshot(now_ms));
        self.last_revision = Some(revision);
        self.last_sent_ms = now_ms;
        bus.publish(BusEvent::SnapshotPushed {
            room_id: self.room_id,
            seat: self.seat,
            snapshot,
        });
        true
    }
}

/// What an incoming opponent snapshot meant to the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorUpdate {
    /// Stale or duplicate; dropped.
    Ignored,
    Updated,
    /// This snapshot is the first to show the opponent dead.
    OpponentDied,
}

/// Inbound side of snapshot sync: the local view of the opponent's field.
pub struct OpponentMirror {
    latest: Option<Arc<PlayerSnapshot>>,
    last_revision: u64,
    seen_dead: bool,
}

impl OpponentMirror {
    pub fn new() -> Self {
        Self {
            latest: None,
            last_revision: 0,
            seen_dead: false,
        }
    }

    pub fn latest(&self) -> Option<&PlayerSnapshot> {
        self.latest.as_deref()
    }

    /// Fold one received snapshot into the mirror. Revisions at or below
    /// the newest already seen are ignored, so replays and reordered
    /// bursts cannot roll the view back. The death edge fires exactly once.
    pub fn observe(&mut self, snapshot: Arc<PlayerSnapshot>) -> MirrorUpdate {
        if snapshot.revision <= self.last_revision && self.latest.is_some() {
            return MirrorUpdate::Ignored;
        }
        self.last_revision = snapshot.revision;
        let died = !snapshot.alive && !self.seen_dead;
        if !snapshot.alive {
            self.seen_dead = true;
        }
        self.latest = Some(snapshot);
        if died {
            MirrorUpdate::OpponentDied
        } else {
            MirrorUpdate::Updated
        }
    }
}

impl Default for OpponentMirror {
    fn default() -> Self {
        Self::new()
    }
}
