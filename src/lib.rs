//! Code Quest - a snake arcade game with coding challenges
//!
//! Core modules:
//! - `sim`: Deterministic arena simulation and phase machine
//! - `script`: Sandboxed interpreter for the challenge language
//! - `evaluator`: Grades submissions against test vectors
//! - `catalog`: The bundled exercises
//! - `progress`: Player records and the store boundary
//! - `engine`: Timers, commands and snapshots tied together

pub mod catalog;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod leaderboard;
pub mod progress;
pub mod script;
pub mod settings;
pub mod sim;
pub mod snapshot;

pub use catalog::{Catalog, Challenge};
pub use engine::{Engine, Submission};
pub use error::{ScriptError, SubmissionFault};
pub use evaluator::{Evaluator, LoopFixMode, ResultKind, TestResult};
pub use leaderboard::Leaderboard;
pub use progress::{JsonFileProgressStore, MemoryProgressStore, ProgressStore, ProgressTracker};
pub use settings::Settings;
pub use snapshot::RenderSnapshot;

/// Game configuration constants
pub mod consts {
    /// Cells per side of the square grid
    pub const GRID_SIZE: i32 = 15;

    /// Points for eating food
    pub const FOOD_POINTS: u32 = 10;
    /// Points lost to a bug; a score below this ends the run instead
    pub const BUG_PENALTY: u32 = 20;
    /// Bugs are topped back up to this count
    pub const BUG_FLOOR: usize = 3;

    /// Maximum timer pulses per `advance` call to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
}
