//! Deterministic match engine: board, pieces, randomizer, and the
//! per-player simulation.

pub mod bag;
pub mod board;
pub mod pieces;
pub mod sim;
pub mod snapshot;

pub use bag::{PieceBag, SimpleRng};
pub use board::Board;
pub use pieces::{Shape, KICK_OFFSETS};
pub use sim::{ActivePiece, CommandOutcome, LockOutcome, PlayerSim, TickOutcome};
pub use snapshot::{PieceSnapshot, PlayerSnapshot};
