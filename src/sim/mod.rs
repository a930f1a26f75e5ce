//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Discrete steps only, timing belongs to the engine
//! - Seeded RNG only
//! - No rendering, storage or evaluator dependencies

pub mod phase;
pub mod spawn;
pub mod state;
pub mod tick;

pub use phase::{complete_challenge, countdown_tick, dismiss_challenge, reset, toggle_play};
pub use spawn::random_free_cell;
pub use state::{
    ActiveChallenge, ChallengeTile, Direction, GameEvent, GameOverReason, GamePhase, GameState,
    Position, RngState, in_bounds,
};
pub use tick::{TickInput, tick};
