//! Head-to-head falling-block match engine.
//!
//! Two players race on separate 10x20 fields fed by per-player seven-bag
//! piece queues. Clearing lines scores, levels up gravity, and (when the
//! rule set allows) sends garbage rows to the opponent. The first field to
//! top out loses; surrender, disconnection, and an optional time limit are
//! the other ways a match ends.
//!
//! The crate is layered bottom-up:
//! - [`core`]: deterministic single-player simulation (board, pieces, bag,
//!   gravity, the lock pipeline, snapshots).
//! - [`rules`]: the configurable scoring/speed/garbage parameters.
//! - [`room`] and [`store`]: lobby records behind an async storage trait.
//! - [`sync`]: snapshot publishing, throttling, and opponent mirroring
//!   over a broadcast event bus.
//! - [`session`]: one tokio task per player, owning that player's
//!   simulation.
//! - [`coordinator`]: room lifecycle and single-shot result arbitration.

pub mod coordinator;
pub mod core;
pub mod room;
pub mod rules;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;

pub use crate::core::{PlayerSim, PlayerSnapshot};
pub use coordinator::{MatchCoordinator, RoomError};
pub use room::{MatchResult, PlayerRecord, Room, RoomStatus};
pub use rules::{GravityCurve, RuleSet};
pub use session::{SessionConfig, SessionHandle};
pub use store::{MatchStore, MemoryStore, StoreError};
pub use sync::{BroadcastBus, BusEvent, EventBus};
pub use types::{EndReason, MatchCommand, PieceKind};
