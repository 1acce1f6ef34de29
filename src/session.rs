//! Per-player session task.
//!
//! Each player in a running match gets one tokio task that owns that
//! player's `PlayerSim` outright. The task multiplexes four inputs with
//! `select!`: player commands, the gravity timer, bus events from the
//! opponent, and the optional match time limit. Because the simulation is
//! task-local, a tick or lock runs to completion before the next input is
//! looked at; there is no point where another task can observe a
//! half-applied lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::coordinator::finalize;
use crate::core::{CommandOutcome, LockOutcome, PlayerSim, TickOutcome};
use crate::room::{PlayerId, PlayerRecord, RoomId, RoomStatus};
use crate::rules::RuleSet;
use crate::store::{MatchStore, PlayerProgress, StoreError};
use crate::sync::{BusEvent, EventBus, MirrorUpdate, OpponentMirror, SnapshotPublisher};
use crate::types::{now_ms, EndReason, MatchCommand};

/// Command channel depth per session. Inputs beyond this are dropped by
/// the sender rather than queued indefinitely.
const COMMAND_BUFFER: usize = 64;

/// Everything a session needs to run one player's side of a match.
pub struct SessionConfig {
    pub room_id: RoomId,
    pub player: PlayerRecord,
    pub opponent_id: PlayerId,
    pub opponent_seat: u8,
    pub rules: Arc<RuleSet>,
    pub seed: u32,
    pub started_ms: u64,
}

/// Handle to a running session: the command channel plus the task itself.
pub struct SessionHandle {
    pub player_id: PlayerId,
    pub seat: u8,
    cmd_tx: mpsc::Sender<MatchCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Send a command to the session. Returns false once the session has
    /// ended.
    pub async fn send(&self, cmd: MatchCommand) -> bool {
        self.cmd_tx.send(cmd).await.is_ok()
    }

    /// Wait for the session task to finish.
    pub async fn finished(self) {
        let _ = self.task.await;
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the session task for one player.
pub fn spawn_session<S: MatchStore, B: EventBus>(
    store: Arc<S>,
    bus: B,
    config: SessionConfig,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let player_id = config.player.id;
    let seat = config.player.seat;
    let task = tokio::spawn(run_session(store, bus, config, cmd_rx));
    SessionHandle {
        player_id,
        seat,
        cmd_tx,
        task,
    }
}

async fn run_session<S: MatchStore, B: EventBus>(
    store: Arc<S>,
    bus: B,
    cfg: SessionConfig,
    mut cmd_rx: mpsc::Receiver<MatchCommand>,
) {
    let mut sim = PlayerSim::new(cfg.rules.clone(), cfg.seed);
    let mut publisher = SnapshotPublisher::new(cfg.room_id, cfg.player.seat);
    let mut mirror = OpponentMirror::new();
    let mut bus_rx = bus.subscribe();

    let mut interval_ms = sim.drop_interval_ms();
    let mut next_drop = Instant::now() + Duration::from_millis(interval_ms as u64);

    // The time limit counts from match start, not session start.
    let limit = cfg.rules.time_limit_secs;
    let limit_sleep = {
        let total_ms = u64::from(limit.unwrap_or(0)) * 1000;
        let elapsed = now_ms().saturating_sub(cfg.started_ms);
        tokio::time::sleep(Duration::from_millis(total_ms.saturating_sub(elapsed)))
    };
    tokio::pin!(limit_sleep);

    // Opening snapshot so the opponent has a board to render.
    publisher.publish(&bus, &sim, now_ms(), true);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(MatchCommand::Leave) => {
                        handle_leave(&store, &bus, &cfg, &sim).await;
                        return;
                    }
                    Some(MatchCommand::Surrender) => {
                        sim.mark_dead(EndReason::Surrendered);
                    }
                    Some(cmd) => {
                        if let CommandOutcome::Locked(lock) = sim.apply(cmd) {
                            after_lock(&store, &bus, &cfg, &sim, lock).await;
                        }
                    }
                }
            }
            _ = sleep_until(next_drop) => {
                match sim.tick() {
                    TickOutcome::Locked(lock) => {
                        after_lock(&store, &bus, &cfg, &sim, lock).await;
                    }
                    TickOutcome::Moved | TickOutcome::Idle => {}
                }
                next_drop = Instant::now() + Duration::from_millis(sim.drop_interval_ms() as u64);
            }
            event = bus_rx.recv() => {
                match event {
                    Ok(event) => {
                        if handle_bus_event(&store, &bus, &cfg, &mut sim, &mut mirror, event).await {
                            drain_and_close(&store, &bus, &cfg, &sim, &mut publisher).await;
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(player = cfg.player.id, missed, "session lagged on event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        return;
                    }
                }
            }
            _ = &mut limit_sleep, if limit.is_some() => {
                handle_time_limit(&store, &bus, &cfg, &sim).await;
                drain_and_close(&store, &bus, &cfg, &sim, &mut publisher).await;
                return;
            }
        }

        // Soft drop and level-ups change the gravity interval; reschedule
        // from now when they do.
        let current = sim.drop_interval_ms();
        if current != interval_ms {
            interval_ms = current;
            next_drop = Instant::now() + Duration::from_millis(interval_ms as u64);
        }

        if !sim.is_alive() {
            // Our own death: flush the terminal snapshot, then arbitrate.
            publisher.publish(&bus, &sim, now_ms(), true);
            persist_progress(store.as_ref(), cfg.player.id, &sim).await;
            let reason = sim.end_reason().unwrap_or(EndReason::ToppedOut);
            let winner = if opponent_alive(&mirror) {
                Some(cfg.opponent_id)
            } else {
                None
            };
            if let Err(err) = finalize(store.as_ref(), &bus, cfg.room_id, winner, reason).await {
                warn!(room = cfg.room_id, %err, "failed to finalize match");
            }
            return;
        }

        publisher.publish(&bus, &sim, now_ms(), false);
    }
}

/// React to one bus event. Returns true when the session should end.
async fn handle_bus_event<S: MatchStore, B: EventBus>(
    store: &Arc<S>,
    bus: &B,
    cfg: &SessionConfig,
    sim: &mut PlayerSim,
    mirror: &mut OpponentMirror,
    event: BusEvent,
) -> bool {
    match event {
        BusEvent::SnapshotPushed {
            room_id, seat, snapshot,
        } if room_id == cfg.room_id && seat == cfg.opponent_seat => {
            let reason = snapshot.end_reason;
            if mirror.observe(snapshot) == MirrorUpdate::OpponentDied {
                let reason = reason.unwrap_or(EndReason::ToppedOut);
                match finalize(store.as_ref(), bus, cfg.room_id, Some(cfg.player.id), reason).await
                {
                    Ok(_) => {}
                    Err(err) => warn!(room = cfg.room_id, %err, "failed to finalize match"),
                }
                return true;
            }
            false
        }
        BusEvent::GarbageSent {
            room_id,
            from_seat,
            rows,
        } if room_id == cfg.room_id && from_seat != cfg.player.seat => {
            sim.queue_garbage(rows);
            false
        }
        BusEvent::RoomStatusChanged { room_id, status } if room_id == cfg.room_id => {
            status == RoomStatus::Finished
        }
        _ => false,
    }
}

async fn after_lock<S: MatchStore, B: EventBus>(
    store: &Arc<S>,
    bus: &B,
    cfg: &SessionConfig,
    sim: &PlayerSim,
    lock: LockOutcome,
) {
    if lock.garbage_out > 0 {
        bus.publish(BusEvent::GarbageSent {
            room_id: cfg.room_id,
            from_seat: cfg.player.seat,
            rows: lock.garbage_out,
        });
    }
    persist_progress(store.as_ref(), cfg.player.id, sim).await;
}

/// The match clock ran out. Our side of the arbitration input is the
/// persisted score, so flush it before `finalize` picks the winner from
/// the store.
async fn handle_time_limit<S: MatchStore, B: EventBus>(
    store: &Arc<S>,
    bus: &B,
    cfg: &SessionConfig,
    sim: &PlayerSim,
) {
    persist_progress(store.as_ref(), cfg.player.id, sim).await;
    if let Err(err) = finalize(
        store.as_ref(),
        bus,
        cfg.room_id,
        None,
        EndReason::TimeLimitReached,
    )
    .await
    {
        warn!(room = cfg.room_id, %err, "failed to finalize match");
    }
}

/// The player's channel closed or they asked to leave.
async fn handle_leave<S: MatchStore, B: EventBus>(
    store: &Arc<S>,
    bus: &B,
    cfg: &SessionConfig,
    sim: &PlayerSim,
) {
    persist_progress(store.as_ref(), cfg.player.id, sim).await;

    let remaining = match store
        .vacate_seat(cfg.room_id, cfg.player.id, now_ms())
        .await
    {
        Ok(n) => n,
        Err(err) => {
            warn!(room = cfg.room_id, player = cfg.player.id, %err, "failed to vacate seat");
            return;
        }
    };
    bus.publish(BusEvent::RosterChanged {
        room_id: cfg.room_id,
    });

    if remaining == 0 {
        // Last one out: close the book on the room and remove it.
        if let Err(err) = finalize(
            store.as_ref(),
            bus,
            cfg.room_id,
            None,
            EndReason::AllDisconnected,
        )
        .await
        {
            warn!(room = cfg.room_id, %err, "failed to finalize abandoned room");
        }
        if let Err(err) = store.delete_room(cfg.room_id).await {
            warn!(room = cfg.room_id, %err, "failed to delete abandoned room");
        }
        bus.publish(BusEvent::RoomListChanged);
        return;
    }

    // Mid-match departure forfeits to the opponent.
    if let Err(err) = finalize(
        store.as_ref(),
        bus,
        cfg.room_id,
        Some(cfg.opponent_id),
        EndReason::OpponentDisconnected,
    )
    .await
    {
        if !matches!(err, StoreError::RoomNotFound(_)) {
            warn!(room = cfg.room_id, %err, "failed to finalize after departure");
        }
    }
}

/// Final flush after the match ended for a reason that was not our own
/// death.
async fn drain_and_close<S: MatchStore, B: EventBus>(
    store: &Arc<S>,
    bus: &B,
    cfg: &SessionConfig,
    sim: &PlayerSim,
    publisher: &mut SnapshotPublisher,
) {
    publisher.publish(bus, sim, now_ms(), true);
    persist_progress(store.as_ref(), cfg.player.id, sim).await;
}

fn opponent_alive(mirror: &OpponentMirror) -> bool {
    mirror.latest().map(|s| s.alive).unwrap_or(true)
}

/// Best effort: a storage hiccup must not kill the simulation.
async fn persist_progress<S: MatchStore>(store: &S, player_id: PlayerId, sim: &PlayerSim) {
    let progress = PlayerProgress {
        score: sim.score(),
        level: sim.level(),
        lines: sim.lines(),
        tetrises: sim.tetrises(),
        alive: sim.is_alive(),
    };
    if let Err(err) = store.update_player_state(player_id, progress, now_ms()).await {
        warn!(player = player_id, %err, "failed to persist player state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::sync::BroadcastBus;

    fn config(seat: u8) -> SessionConfig {
        SessionConfig {
            room_id: 7,
            player: PlayerRecord {
                id: 1,
                room_id: 7,
                name: "a".into(),
                seat,
                score: 0,
                level: 1,
                lines: 0,
                tetrises: 0,
                alive: true,
                updated_ms: 0,
            },
            opponent_id: 2,
            opponent_seat: 1 - seat,
            rules: Arc::new(RuleSet::standard()),
            seed: 1,
            started_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_lock_with_garbage_out_announces_it_from_own_seat() {
        let store = Arc::new(MemoryStore::new());
        let bus = BroadcastBus::new(16);
        let mut rx = bus.subscribe();
        let cfg = config(1);
        let sim = PlayerSim::new(cfg.rules.clone(), cfg.seed);

        let lock = LockOutcome {
            lines_cleared: 3,
            garbage_out: 2,
            leveled_up: false,
            topped_out: false,
        };
        after_lock(&store, &bus, &cfg, &sim, lock).await;
        match rx.try_recv().unwrap() {
            BusEvent::GarbageSent {
                room_id,
                from_seat,
                rows,
            } => {
                assert_eq!(room_id, 7);
                assert_eq!(from_seat, 1);
                assert_eq!(rows, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Single-line clears carry no attack and stay off the bus.
        let lock = LockOutcome {
            lines_cleared: 1,
            garbage_out: 0,
            leveled_up: false,
            topped_out: false,
        };
        after_lock(&store, &bus, &cfg, &sim, lock).await;
        assert!(rx.try_recv().is_err());
    }
}
