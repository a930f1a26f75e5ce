//! Game state and core simulation types
//!
//! Everything a run needs to be replayed from its seed lives here.

use glam::IVec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::consts::*;

/// Grid cell, `0 <= x, y < GRID_SIZE`
pub type Position = IVec2;

/// True when `pos` lies on the grid
#[inline]
pub fn in_bounds(pos: Position) -> bool {
    (0..GRID_SIZE).contains(&pos.x) && (0..GRID_SIZE).contains(&pos.y)
}

/// Heading of the snake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Grid offset for one step (y grows downward)
    pub fn delta(&self) -> IVec2 {
        match self {
            Direction::Up => IVec2::new(0, -1),
            Direction::Down => IVec2::new(0, 1),
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }

    /// Accepts names and arrow/WASD key names
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" | "arrowup" | "w" => Some(Direction::Up),
            "down" | "arrowdown" | "s" => Some(Direction::Down),
            "left" | "arrowleft" | "a" => Some(Direction::Left),
            "right" | "arrowright" | "d" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Not started, or paused
    Idle,
    /// Counting down before play resumes
    Countdown,
    /// Arena is stepping
    Running,
    /// Arena frozen while a coding exercise is open
    ChallengeActive,
    /// Run ended
    GameOver,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Idle => "Idle",
            GamePhase::Countdown => "Countdown",
            GamePhase::Running => "Running",
            GamePhase::ChallengeActive => "ChallengeActive",
            GamePhase::GameOver => "GameOver",
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    #[serde(rename = "wall")]
    Wall,
    #[serde(rename = "self")]
    SelfCollision,
    #[serde(rename = "bug")]
    Bug,
}

/// A challenge tile; `slot` picks the catalog entry round-robin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTile {
    pub pos: Position,
    pub slot: usize,
}

/// The exercise currently open and the tile that opened it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChallenge {
    pub slot: usize,
    pub tile: Position,
    pub challenge_id: String,
}

/// Things that happened during a step or transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    FoodEaten { pos: Position, score: u32 },
    FoodSpawned { pos: Position },
    ChallengeEntered { challenge_id: String },
    BugEaten { pos: Position, score: u32 },
    BugSpawned { pos: Position },
    /// `score` is the score before any bug penalty
    GameOver { reason: GameOverReason, score: u32 },
    Countdown { remaining: u8 },
    Resumed,
    Paused,
    ChallengeSolved { challenge_id: String, points: u32 },
    ChallengeSkipped { challenge_id: String },
    Reset,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Generator for one spawn; each call uses the next stream
    pub fn next_rng(&mut self) -> Pcg32 {
        let rng = Pcg32::new(self.seed, self.stream);
        self.stream += 1;
        rng
    }
}

/// Complete game state (deterministic, serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed; reset reseeds from it
    pub seed: u64,
    pub rng_state: RngState,
    /// Head first, never empty
    pub snake: Vec<Position>,
    pub direction: Direction,
    /// Buffered turn, applied at the start of the next arena step
    pub pending_direction: Option<Direction>,
    pub food: Vec<Position>,
    pub challenges: Vec<ChallengeTile>,
    pub bugs: Vec<Position>,
    pub score: u32,
    pub level: u32,
    pub phase: GamePhase,
    pub game_over_reason: Option<GameOverReason>,
    pub active_challenge: Option<ActiveChallenge>,
    pub solved: BTreeSet<String>,
    pub countdown: Option<u8>,
    /// Arena steps taken this run
    pub time_ticks: u64,
}

impl GameState {
    /// Create the initial configuration for a run
    pub fn new(seed: u64) -> Self {
        let tile = |x, y, slot| ChallengeTile {
            pos: IVec2::new(x, y),
            slot,
        };
        Self {
            seed,
            rng_state: RngState::new(seed),
            snake: vec![IVec2::new(7, 7)],
            direction: Direction::Right,
            pending_direction: None,
            food: vec![IVec2::new(12, 10)],
            challenges: vec![tile(3, 3, 0), tile(11, 5, 1), tile(6, 12, 2)],
            bugs: vec![IVec2::new(8, 11), IVec2::new(13, 3), IVec2::new(2, 9)],
            score: 0,
            level: 1,
            phase: GamePhase::Idle,
            game_over_reason: None,
            active_challenge: None,
            solved: BTreeSet::new(),
            countdown: None,
            time_ticks: 0,
        }
    }

    pub fn head(&self) -> Position {
        self.snake[0]
    }

    /// True when nothing occupies `pos`
    pub fn is_free(&self, pos: Position) -> bool {
        !self.snake.contains(&pos)
            && !self.food.contains(&pos)
            && !self.bugs.contains(&pos)
            && !self.challenges.iter().any(|c| c.pos == pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_configuration() {
        let state = GameState::new(7);
        assert_eq!(state.snake, [IVec2::new(7, 7)]);
        assert_eq!(state.direction, Direction::Right);
        assert_eq!(state.food, [IVec2::new(12, 10)]);
        assert_eq!(state.bugs.len(), BUG_FLOOR);
        assert_eq!(
            state.challenges.iter().map(|c| c.slot).collect::<Vec<_>>(),
            [0, 1, 2]
        );
        assert_eq!(state.level, 1);
        assert_eq!(state.phase, GamePhase::Idle);
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(Direction::from_str("ArrowUp"), Some(Direction::Up));
        assert_eq!(Direction::from_str("d"), Some(Direction::Right));
        assert_eq!(Direction::from_str("north"), None);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
    }

    #[test]
    fn test_rng_streams_differ_and_replay() {
        use rand::Rng;
        let mut a = RngState::new(42);
        let mut b = RngState::new(42);
        let first: u32 = a.next_rng().random();
        let second: u32 = a.next_rng().random();
        assert_ne!(first, second);
        assert_eq!(first, b.next_rng().random::<u32>());
    }

    #[test]
    fn test_bounds() {
        assert!(in_bounds(IVec2::new(0, 14)));
        assert!(!in_bounds(IVec2::new(15, 0)));
        assert!(!in_bounds(IVec2::new(-1, 3)));
    }

    #[test]
    fn test_game_over_reason_names() {
        assert_eq!(
            serde_json::to_string(&GameOverReason::SelfCollision).unwrap(),
            "\"self\""
        );
    }
}
