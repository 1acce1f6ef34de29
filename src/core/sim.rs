//! Per-player simulation: the falling piece, gravity, input handling, and
//! the lock pipeline.
//!
//! One `PlayerSim` owns everything for one field. Nothing here is shared or
//! locked; cross-player effects (garbage, snapshots) leave as plain values
//! and are routed by the session layer. A lock is a single synchronous
//! pipeline: write the piece, clear rows, score, maybe level up, compute
//! outgoing garbage, apply queued incoming garbage, spawn the next piece.
//! No intermediate state is ever observable.

use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::rules::RuleSet;
use crate::types::{CellTag, EndReason, MatchCommand, PieceKind, BOARD_HEIGHT, SPAWN_X, SPAWN_Y};

use super::bag::{PieceBag, SimpleRng};
use super::board::Board;
use super::pieces::{Shape, KICK_OFFSETS};
use super::snapshot::{PieceSnapshot, PlayerSnapshot};

/// The piece currently in flight.
#[derive(Debug, Clone, Copy)]
pub struct ActivePiece {
    pub kind: PieceKind,
    pub shape: Shape,
    pub x: i8,
    pub y: i8,
}

impl ActivePiece {
    fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            shape: Shape::of(kind),
            x: SPAWN_X,
            y: SPAWN_Y,
        }
    }
}

/// What happened when a piece locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOutcome {
    pub lines_cleared: u8,
    /// Garbage rows to send to the opponent.
    pub garbage_out: u8,
    pub leveled_up: bool,
    pub topped_out: bool,
}

/// Result of one gravity tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do (dead, paused, or no active piece).
    Idle,
    /// The piece descended one row.
    Moved,
    /// The piece could not descend and locked in place.
    Locked(LockOutcome),
}

/// Result of applying a player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command had no effect (blocked move, disabled feature, dead).
    Ignored,
    /// The command changed state without locking a piece.
    Applied,
    /// The command ended with a lock (hard drop).
    Locked(LockOutcome),
}

/// One player's complete game simulation.
pub struct PlayerSim {
    board: Board,
    bag: PieceBag,
    /// Hole positions for incoming garbage come from the receiver's own
    /// stream so replays stay deterministic per seed.
    garbage_rng: SimpleRng,
    rules: Arc<RuleSet>,
    active: Option<ActivePiece>,
    hold: Option<PieceKind>,
    hold_used: bool,
    pending_garbage: u8,
    score: u32,
    level: u32,
    lines: u32,
    tetrises: u32,
    soft_dropping: bool,
    paused: bool,
    alive: bool,
    end_reason: Option<EndReason>,
    revision: u64,
}

impl PlayerSim {
    pub fn new(rules: Arc<RuleSet>, seed: u32) -> Self {
        let mut sim = Self {
            board: Board::new(),
            bag: PieceBag::new(seed),
            garbage_rng: SimpleRng::new(seed.wrapping_mul(0x9e37_79b9).wrapping_add(1)),
            rules,
            active: None,
            hold: None,
            hold_used: false,
            pending_garbage: 0,
            score: 0,
            level: 1,
            lines: 0,
            tetrises: 0,
            soft_dropping: false,
            paused: false,
            alive: true,
            end_reason: None,
            revision: 0,
        };
        sim.spawn_next();
        sim
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn tetrises(&self) -> u32 {
        self.tetrises
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn active(&self) -> Option<&ActivePiece> {
        self.active.as_ref()
    }

    /// Current gravity interval in milliseconds, honoring soft drop.
    pub fn drop_interval_ms(&self) -> u32 {
        if self.soft_dropping {
            self.rules.soft_drop_interval_ms(self.level)
        } else {
            self.rules.drop_interval_ms(self.level)
        }
    }

    /// Advance gravity one step.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.alive || self.paused {
            return TickOutcome::Idle;
        }
        let Some(piece) = self.active else {
            return TickOutcome::Idle;
        };

        if !self.board.collides(piece.x, piece.y + 1, &piece.shape) {
            let piece = self.active.as_mut().unwrap();
            piece.y += 1;
            if self.soft_dropping {
                self.score = self.score.saturating_add(self.rules.soft_drop_score);
            }
            self.revision += 1;
            return TickOutcome::Moved;
        }

        TickOutcome::Locked(self.lock_active())
    }

    /// Apply a player command. Surrender and leave are session concerns and
    /// reach the simulation only as `mark_dead`.
    pub fn apply(&mut self, cmd: MatchCommand) -> CommandOutcome {
        if !self.alive {
            return CommandOutcome::Ignored;
        }
        if cmd == MatchCommand::PauseToggle {
            self.paused = !self.paused;
            self.revision += 1;
            return CommandOutcome::Applied;
        }
        if self.paused {
            return CommandOutcome::Ignored;
        }

        match cmd {
            MatchCommand::MoveLeft => self.try_shift(-1),
            MatchCommand::MoveRight => self.try_shift(1),
            MatchCommand::Rotate => self.try_rotate(),
            MatchCommand::SoftDropStart => {
                if self.soft_dropping {
                    CommandOutcome::Ignored
                } else {
                    self.soft_dropping = true;
                    CommandOutcome::Applied
                }
            }
            MatchCommand::SoftDropStop => {
                if self.soft_dropping {
                    self.soft_dropping = false;
                    CommandOutcome::Applied
                } else {
                    CommandOutcome::Ignored
                }
            }
            MatchCommand::HardDrop => self.hard_drop(),
            MatchCommand::Hold => self.try_hold(),
            MatchCommand::PauseToggle
            | MatchCommand::Surrender
            | MatchCommand::Leave => CommandOutcome::Ignored,
        }
    }

    /// Queue incoming garbage rows; they enter the board at the next lock.
    pub fn queue_garbage(&mut self, rows: u8) {
        if self.alive && rows > 0 {
            self.pending_garbage = self.pending_garbage.saturating_add(rows);
        }
    }

    /// Kill this simulation with the given reason. Idempotent.
    pub fn mark_dead(&mut self, reason: EndReason) {
        if self.alive {
            self.alive = false;
            self.end_reason = Some(reason);
            self.active = None;
            self.soft_dropping = false;
            self.revision += 1;
        }
    }

    fn try_shift(&mut self, dx: i8) -> CommandOutcome {
        let Some(piece) = self.active else {
            return CommandOutcome::Ignored;
        };
        if self.board.collides(piece.x + dx, piece.y, &piece.shape) {
            return CommandOutcome::Ignored;
        }
        self.active.as_mut().unwrap().x += dx;
        self.revision += 1;
        CommandOutcome::Applied
    }

    /// Clockwise rotation with wall kicks. The first offset that does not
    /// collide wins; if all six fail the rotation is refused.
    fn try_rotate(&mut self) -> CommandOutcome {
        let Some(piece) = self.active else {
            return CommandOutcome::Ignored;
        };
        let rotated = piece.shape.rotated_cw();

        for (kx, ky) in KICK_OFFSETS {
            if !self.board.collides(piece.x + kx, piece.y + ky, &rotated) {
                let piece = self.active.as_mut().unwrap();
                piece.shape = rotated;
                piece.x += kx;
                piece.y += ky;
                self.revision += 1;
                return CommandOutcome::Applied;
            }
        }
        CommandOutcome::Ignored
    }

    fn hard_drop(&mut self) -> CommandOutcome {
        let Some(piece) = self.active else {
            return CommandOutcome::Ignored;
        };
        let landing = self.landing_y(&piece);
        let distance = (landing - piece.y).max(0) as u32;

        let piece = self.active.as_mut().unwrap();
        piece.y = landing;
        self.score = self
            .score
            .saturating_add(distance.saturating_mul(self.rules.hard_drop_score));

        CommandOutcome::Locked(self.lock_active())
    }

    /// Swap the active piece with the hold slot. Once per piece, and only
    /// when the rule set enables it. Refused if the swapped-in piece would
    /// collide at spawn.
    fn try_hold(&mut self) -> CommandOutcome {
        if !self.rules.hold_piece_enabled || self.hold_used {
            return CommandOutcome::Ignored;
        }
        let Some(piece) = self.active else {
            return CommandOutcome::Ignored;
        };

        let incoming = match self.hold {
            Some(kind) => kind,
            None => self.bag.draw(),
        };
        let replacement = ActivePiece::spawn(incoming);
        if self
            .board
            .collides(replacement.x, replacement.y, &replacement.shape)
        {
            return CommandOutcome::Ignored;
        }

        self.hold = Some(piece.kind);
        self.hold_used = true;
        self.active = Some(replacement);
        self.revision += 1;
        CommandOutcome::Applied
    }

    /// Lowest non-colliding row for the piece in its current column.
    fn landing_y(&self, piece: &ActivePiece) -> i8 {
        let mut y = piece.y;
        while !self.board.collides(piece.x, y + 1, &piece.shape) {
            y += 1;
        }
        y
    }

    /// The full lock pipeline. Runs synchronously; by the time this returns
    /// the board, score, level, and next piece are all settled.
    fn lock_active(&mut self) -> LockOutcome {
        let piece = self
            .active
            .take()
            .expect("lock_active requires an active piece");
        self.board
            .lock(piece.x, piece.y, &piece.shape, CellTag::Piece(piece.kind));

        let lines_cleared = self.board.clear_full_rows();
        let mut leveled_up = false;
        if lines_cleared > 0 {
            self.score = self
                .score
                .saturating_add(self.rules.clear_score(lines_cleared, self.level));
            self.lines += lines_cleared as u32;
            if lines_cleared == 4 {
                self.tetrises += 1;
            }
            if self.rules.should_level_up(self.lines, self.level) {
                self.level += 1;
                leveled_up = true;
            }
        }

        let garbage_out = self.rules.garbage_rows_for(lines_cleared);

        let mut topped_out = false;
        if self.pending_garbage > 0 {
            let count = (self.pending_garbage as usize).min(self.board.height() as usize);
            self.pending_garbage = 0;
            let mut holes: ArrayVec<u8, { BOARD_HEIGHT as usize }> = ArrayVec::new();
            for _ in 0..count {
                holes.push(self.garbage_rng.next_range(self.board.width() as u32) as u8);
            }
            topped_out = self.board.insert_garbage_rows(&holes);
        }

        self.hold_used = false;
        if !topped_out {
            topped_out = !self.spawn_next();
        }
        if topped_out {
            self.mark_dead(EndReason::ToppedOut);
        }
        self.revision += 1;

        LockOutcome {
            lines_cleared,
            garbage_out,
            leveled_up,
            topped_out,
        }
    }

    /// Draw and place the next piece. Returns false when it cannot spawn
    /// without overlap (top-out).
    fn spawn_next(&mut self) -> bool {
        let piece = ActivePiece::spawn(self.bag.draw());
        if self.board.collides(piece.x, piece.y, &piece.shape) {
            self.active = None;
            return false;
        }
        self.active = Some(piece);
        true
    }

    /// Write the current state into `snap`. `now_ms` stamps the snapshot.
    pub fn snapshot_into(&self, snap: &mut PlayerSnapshot, now_ms: u64) {
        self.board.write_u8_grid(&mut snap.board);
        snap.active = self.active.map(|p| PieceSnapshot {
            kind: p.kind,
            shape: p.shape,
            x: p.x,
            y: p.y,
        });
        snap.ghost_y = if self.rules.ghost_piece_enabled {
            self.active.map(|p| self.landing_y(&p))
        } else {
            None
        };
        snap.next = self.bag.peek();
        snap.hold = self.hold;
        snap.score = self.score;
        snap.level = self.level;
        snap.lines = self.lines;
        snap.tetrises = self.tetrises;
        snap.alive = self.alive;
        snap.end_reason = self.end_reason;
        snap.revision = self.revision;
        snap.updated_ms = now_ms;
    }

    pub fn snapshot(&self, now_ms: u64) -> PlayerSnapshot {
        let mut snap = PlayerSnapshot::empty();
        self.snapshot_into(&mut snap, now_ms);
        snap
    }
}
