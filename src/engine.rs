//! Engine driver
//!
//! Owns the game state and both timers, routes player commands and produces
//! snapshots. Single-threaded: the host calls `advance` with elapsed wall
//! time and every command runs to completion between pulses.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Catalog, Challenge};
use crate::consts::MAX_SUBSTEPS;
use crate::evaluator::{Evaluator, TestResult, all_passed};
use crate::leaderboard::Leaderboard;
use crate::progress::{ProgressStore, ProgressTracker, StoreError, UserProgress};
use crate::settings::Settings;
use crate::sim::{self, Direction, GameEvent, GamePhase, GameState, TickInput};
use crate::snapshot::RenderSnapshot;

/// Outcome of grading one submission
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submission {
    pub results: Vec<TestResult>,
    /// `ChallengeSolved` when every test passed
    pub event: Option<GameEvent>,
}

impl Submission {
    pub fn solved(&self) -> bool {
        self.event.is_some()
    }
}

pub struct Engine {
    state: GameState,
    catalog: Arc<Catalog>,
    evaluator: Evaluator,
    progress: ProgressTracker,
    settings: Settings,
    /// Time owed to the arena timer
    arena_acc: Duration,
    /// Time owed to the countdown timer
    countdown_acc: Duration,
    last_results: Vec<TestResult>,
    hints_shown: usize,
}

impl Engine {
    pub fn new(settings: Settings, catalog: Arc<Catalog>, store: Box<dyn ProgressStore>) -> Self {
        let seed = settings.run_seed();
        log::info!(
            "Engine ready: seed {seed}, {} challenges, loop-fix mode {}",
            catalog.len(),
            settings.loop_fix.as_str()
        );
        Self {
            state: GameState::new(seed),
            evaluator: Evaluator::new(settings.evaluator_config()),
            catalog,
            progress: ProgressTracker::new(store),
            settings,
            arena_acc: Duration::ZERO,
            countdown_acc: Duration::ZERO,
            last_results: Vec::new(),
            hints_shown: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Verdicts of the latest submission for the open challenge
    pub fn last_results(&self) -> &[TestResult] {
        &self.last_results
    }

    /// The exercise currently open, if any
    pub fn active_challenge(&self) -> Option<&Challenge> {
        self.state
            .active_challenge
            .as_ref()
            .map(|active| self.catalog.by_index(active.slot))
    }

    /// Buffer a turn for the next arena step. Returns false when discarded.
    pub fn turn(&mut self, direction: Direction) -> bool {
        if matches!(
            self.state.phase,
            GamePhase::Countdown | GamePhase::ChallengeActive | GamePhase::GameOver
        ) {
            return false;
        }
        if self.settings.block_reversal && self.state.snake.len() > 1 {
            let heading = self.state.pending_direction.unwrap_or(self.state.direction);
            if direction == heading.opposite() {
                log::debug!("Reversal to {} blocked", direction.as_str());
                return false;
            }
        }
        self.state.pending_direction = Some(direction);
        true
    }

    /// Play/pause
    pub fn toggle_play(&mut self) -> Option<GameEvent> {
        let event = sim::toggle_play(&mut self.state, self.settings.countdown_start);
        if event.is_some() {
            self.arena_acc = Duration::ZERO;
            self.countdown_acc = Duration::ZERO;
        }
        event
    }

    /// Feed elapsed wall time; runs whatever pulses fell due
    pub fn advance(&mut self, elapsed: Duration) -> Vec<GameEvent> {
        let arena_period = Duration::from_millis(self.settings.tick_interval_ms.max(1));
        let countdown_period = Duration::from_millis(self.settings.countdown_interval_ms.max(1));
        let mut events = Vec::new();

        match self.state.phase {
            GamePhase::Countdown if self.state.countdown != Some(0) => self.countdown_acc += elapsed,
            GamePhase::Countdown | GamePhase::Running => self.arena_acc += elapsed,
            _ => return events,
        }

        let mut substeps = 0;
        while substeps < MAX_SUBSTEPS {
            let counting = self.state.phase == GamePhase::Countdown && self.state.countdown != Some(0);
            if counting {
                if self.countdown_acc < countdown_period {
                    break;
                }
                self.countdown_acc -= countdown_period;
                events.extend(self.step_countdown());
                if self.state.countdown == Some(0) {
                    // Leftover time carries into the arena timer
                    self.arena_acc += self.countdown_acc;
                    self.countdown_acc = Duration::ZERO;
                }
            } else if matches!(self.state.phase, GamePhase::Running | GamePhase::Countdown)
                && self.arena_acc >= arena_period
            {
                self.arena_acc -= arena_period;
                events.extend(self.step_arena());
            } else {
                break;
            }
            substeps += 1;
        }

        if substeps == MAX_SUBSTEPS
            && (self.arena_acc >= arena_period || self.countdown_acc >= countdown_period)
        {
            log::debug!("Dropping timer backlog after {MAX_SUBSTEPS} pulses");
            self.arena_acc = Duration::ZERO;
            self.countdown_acc = Duration::ZERO;
        }
        if !matches!(self.state.phase, GamePhase::Running | GamePhase::Countdown) {
            self.arena_acc = Duration::ZERO;
            self.countdown_acc = Duration::ZERO;
        }
        events
    }

    /// One arena pulse
    pub fn step_arena(&mut self) -> Vec<GameEvent> {
        let events = sim::tick(&mut self.state, &TickInput::default(), &self.catalog);
        for event in &events {
            match event {
                GameEvent::GameOver { score, .. } => {
                    self.progress.maybe_update_high_score(*score);
                }
                GameEvent::ChallengeEntered { .. } => {
                    self.last_results.clear();
                    self.hints_shown = 0;
                }
                _ => {}
            }
        }
        events
    }

    /// One countdown pulse
    pub fn step_countdown(&mut self) -> Option<GameEvent> {
        sim::countdown_tick(&mut self.state)
    }

    /// Grade code for the open challenge; a full pass solves it and resumes play
    pub fn submit(&mut self, code: &str) -> Submission {
        let Some(active) = self.state.active_challenge.clone() else {
            log::warn!("Submission ignored: no challenge open");
            return Submission::default();
        };
        let catalog = Arc::clone(&self.catalog);
        let challenge = catalog.by_index(active.slot);

        let results = self.evaluator.evaluate(challenge, code);
        let passed = results.iter().filter(|r| r.passed).count();
        log::info!("{}: {passed}/{} passed", challenge.id, results.len());

        let mut event = None;
        if all_passed(&results)
            && let Some(closed) = sim::complete_challenge(&mut self.state)
        {
            log::debug!("Tile at {} cleared", closed.tile);
            event = Some(self.progress.award_challenge(&mut self.state, challenge));
            self.hints_shown = 0;
            self.arena_acc = Duration::ZERO;
        }
        self.last_results = results.clone();
        Submission { results, event }
    }

    /// Close the challenge without solving; the tile stays on the grid
    pub fn skip_challenge(&mut self) -> Option<GameEvent> {
        let event = sim::dismiss_challenge(&mut self.state)?;
        self.last_results.clear();
        self.hints_shown = 0;
        self.arena_acc = Duration::ZERO;
        Some(event)
    }

    /// Reveal the next hint of the open challenge, returning it
    pub fn next_hint(&mut self) -> Option<&str> {
        let slot = self.state.active_challenge.as_ref()?.slot;
        let hints = &self.catalog.by_index(slot).hints;
        if hints.is_empty() {
            return None;
        }
        self.hints_shown = (self.hints_shown + 1).min(hints.len());
        hints.get(self.hints_shown - 1).map(String::as_str)
    }

    pub fn hints_shown(&self) -> usize {
        self.hints_shown
    }

    /// Back to the run's initial configuration
    pub fn reset(&mut self) -> GameEvent {
        self.arena_acc = Duration::ZERO;
        self.countdown_acc = Duration::ZERO;
        self.last_results.clear();
        self.hints_shown = 0;
        sim::reset(&mut self.state)
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(&self.state, &self.catalog, &self.last_results, self.hints_shown)
    }

    pub fn sign_in(&mut self, user_id: &str) -> Result<&UserProgress, StoreError> {
        self.progress.sign_in(user_id)
    }

    pub fn sign_out(&mut self) {
        self.progress.sign_out();
    }

    pub fn solved_count(&self) -> usize {
        self.progress.solved_count(&self.state)
    }

    pub fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        self.progress.leaderboard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgressStore;
    use crate::sim::{ChallengeTile, Position};

    fn engine() -> Engine {
        let settings = Settings {
            seed: Some(11),
            ..Settings::default()
        };
        let mut store = MemoryProgressStore::new();
        store.register("u1", "Ada");
        Engine::new(settings, Arc::new(Catalog::builtin()), Box::new(store))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn start(engine: &mut Engine) {
        engine.toggle_play();
        engine.advance(ms(3000));
        engine.advance(ms(250));
        assert_eq!(engine.state().phase, GamePhase::Running);
    }

    #[test]
    fn test_countdown_then_running() {
        let mut engine = engine();
        engine.toggle_play();
        let events = engine.advance(ms(2500));
        assert_eq!(
            events,
            [
                GameEvent::Countdown { remaining: 2 },
                GameEvent::Countdown { remaining: 1 }
            ]
        );
        engine.advance(ms(500));
        assert_eq!(engine.state().countdown, Some(0));
        assert_eq!(engine.advance(ms(250)), [GameEvent::Resumed]);
        assert_eq!(engine.state().snake, [Position::new(7, 7)]);
        engine.advance(ms(250));
        assert_eq!(engine.state().snake, [Position::new(8, 7)]);
    }

    #[test]
    fn test_substeps_capped() {
        let mut engine = engine();
        start(&mut engine);
        engine.state.snake = vec![Position::new(0, 7)];
        engine.advance(ms(10_000));
        assert_eq!(engine.state().head(), Position::new(8, 7));
        assert_eq!(engine.state().time_ticks, u64::from(MAX_SUBSTEPS));
        // Backlog was dropped
        engine.advance(ms(100));
        assert_eq!(engine.state().time_ticks, u64::from(MAX_SUBSTEPS));
    }

    #[test]
    fn test_idle_does_not_accumulate() {
        let mut engine = engine();
        engine.advance(ms(5000));
        assert_eq!(engine.state().time_ticks, 0);
        assert_eq!(engine.state().phase, GamePhase::Idle);
    }

    #[test]
    fn test_turn_discarded_during_countdown() {
        let mut engine = engine();
        assert!(engine.turn(Direction::Down));
        engine.toggle_play();
        assert!(!engine.turn(Direction::Up));
        assert_eq!(engine.state().pending_direction, Some(Direction::Down));
    }

    #[test]
    fn test_block_reversal_setting() {
        let mut engine = engine();
        engine.settings.block_reversal = true;
        engine.state.snake = vec![Position::new(7, 7), Position::new(6, 7)];
        assert!(!engine.turn(Direction::Left));
        assert!(engine.turn(Direction::Up));
    }

    fn open_challenge(engine: &mut Engine, slot: usize) {
        start(engine);
        engine.state.challenges = vec![ChallengeTile {
            pos: Position::new(8, 7),
            slot,
        }];
        engine.advance(ms(250));
        assert_eq!(engine.state().phase, GamePhase::ChallengeActive);
    }

    #[test]
    fn test_solve_challenge() {
        let mut engine = engine();
        engine.sign_in("u1").unwrap();
        open_challenge(&mut engine, 0);
        let submission = engine.submit("def array_sum(numbers): return sum(numbers)");
        assert!(all_passed(&submission.results));
        assert_eq!(
            submission.event,
            Some(GameEvent::ChallengeSolved {
                challenge_id: "array-sum".into(),
                points: 100
            })
        );
        assert_eq!(engine.state().phase, GamePhase::Running);
        assert_eq!(engine.state().score, 100);
        assert!(engine.state().challenges.is_empty());
        assert_eq!(engine.solved_count(), 1);
        assert!(engine.progress().record().unwrap().completed.contains("array-sum"));
    }

    #[test]
    fn test_failed_submission_keeps_challenge_open() {
        let mut engine = engine();
        open_challenge(&mut engine, 1);
        let submission = engine.submit("def count_down(n):\n    pass");
        assert!(!submission.solved());
        let results = submission.results;
        assert_eq!(results.len(), 1);
        assert_eq!(engine.state().phase, GamePhase::ChallengeActive);
        assert_eq!(engine.snapshot().results, results);
        // Arena stays frozen
        engine.advance(ms(1000));
        assert_eq!(engine.state().snake, [Position::new(8, 7)]);
    }

    #[test]
    fn test_skip_keeps_tile() {
        let mut engine = engine();
        open_challenge(&mut engine, 2);
        assert!(engine.skip_challenge().is_some());
        assert_eq!(engine.state().phase, GamePhase::Running);
        assert_eq!(engine.state().challenges.len(), 1);
        assert_eq!(engine.state().score, 0);
    }

    #[test]
    fn test_hint_progression() {
        let mut engine = engine();
        assert_eq!(engine.next_hint(), None);
        open_challenge(&mut engine, 0);
        let total = engine.active_challenge().unwrap().hints.len();
        let first = engine.next_hint().map(str::to_string);
        assert_eq!(first.as_deref(), Some(engine.catalog().by_index(0).hints[0].as_str()));
        for _ in 0..10 {
            engine.next_hint();
        }
        assert_eq!(engine.hints_shown(), total);
        assert_eq!(engine.snapshot().challenge.unwrap().hints.len(), total);
    }

    #[test]
    fn test_game_over_updates_high_score() {
        let mut engine = engine();
        engine.sign_in("u1").unwrap();
        start(&mut engine);
        engine.state.score = 70;
        engine.state.snake = vec![Position::new(14, 7)];
        engine.advance(ms(250));
        assert_eq!(engine.state().phase, GamePhase::GameOver);
        assert_eq!(engine.progress().record().unwrap().high_score, 70);
        assert_eq!(engine.leaderboard().unwrap().top_score(), Some(70));
    }

    #[test]
    fn test_reset() {
        let mut engine = engine();
        open_challenge(&mut engine, 0);
        engine.next_hint();
        engine.reset();
        assert_eq!(engine.state(), &GameState::new(11));
        assert_eq!(engine.hints_shown(), 0);
        assert!(engine.last_results().is_empty());
    }
}
