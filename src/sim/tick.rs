//! Arena step
//!
//! One discrete snake move per call. Pure over `GameState`: all randomness
//! comes from the seeded RNG state, so a run replays from its seed and inputs.

use super::spawn::random_free_cell;
use super::state::{
    ActiveChallenge, Direction, GameEvent, GameOverReason, GamePhase, GameState, in_bounds,
};
use crate::catalog::Catalog;
use crate::consts::*;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Turn to apply before moving; falls back to the state's buffered turn
    pub turn: Option<Direction>,
}

/// Advance the arena by one step
pub fn tick(state: &mut GameState, input: &TickInput, catalog: &Catalog) -> Vec<GameEvent> {
    let mut events = Vec::new();

    // A finished countdown hands over to the arena on the next pulse
    if state.phase == GamePhase::Countdown && state.countdown == Some(0) {
        state.countdown = None;
        state.phase = GamePhase::Running;
        log::info!("Countdown finished, running");
        events.push(GameEvent::Resumed);
        return events;
    }

    if state.phase != GamePhase::Running {
        return events;
    }

    state.time_ticks += 1;
    let pending = state.pending_direction.take();
    if let Some(turn) = input.turn.or(pending) {
        state.direction = turn;
    }

    let target = state.head() + state.direction.delta();

    // Reject before moving: the head is never written off the grid
    let score = state.score;
    if !in_bounds(target) {
        game_over(state, GameOverReason::Wall, score, &mut events);
        return events;
    }
    if state.snake.iter().skip(1).any(|&segment| segment == target) {
        game_over(state, GameOverReason::SelfCollision, score, &mut events);
        return events;
    }

    state.snake.insert(0, target);

    if let Some(i) = state.food.iter().position(|&f| f == target) {
        state.food.remove(i);
        state.score += FOOD_POINTS;
        events.push(GameEvent::FoodEaten {
            pos: target,
            score: state.score,
        });
        match random_free_cell(state) {
            Some(pos) => {
                state.food.push(pos);
                events.push(GameEvent::FoodSpawned { pos });
            }
            None => spawn_failed("food"),
        }
        // Growing: no tail trim
    } else if let Some(tile) = state.challenges.iter().find(|c| c.pos == target).copied() {
        state.snake.pop();
        let challenge = catalog.by_index(tile.slot);
        log::info!("Challenge entered: {} (slot {})", challenge.id, tile.slot);
        state.active_challenge = Some(ActiveChallenge {
            slot: tile.slot,
            tile: tile.pos,
            challenge_id: challenge.id.clone(),
        });
        state.phase = GamePhase::ChallengeActive;
        events.push(GameEvent::ChallengeEntered {
            challenge_id: challenge.id.clone(),
        });
    } else if let Some(i) = state.bugs.iter().position(|&b| b == target) {
        state.bugs.remove(i);
        let len = state.snake.len();
        let keep = if len > 2 { len - 2 } else { len - 1 };
        state.snake.truncate(keep.max(1));

        let before = state.score;
        if before < BUG_PENALTY {
            state.score = 0;
            events.push(GameEvent::BugEaten {
                pos: target,
                score: 0,
            });
            game_over(state, GameOverReason::Bug, before, &mut events);
        } else {
            state.score = before - BUG_PENALTY;
            events.push(GameEvent::BugEaten {
                pos: target,
                score: state.score,
            });
        }
    } else if state.bugs.len() < BUG_FLOOR {
        match random_free_cell(state) {
            Some(pos) => {
                state.bugs.push(pos);
                events.push(GameEvent::BugSpawned { pos });
            }
            None => spawn_failed("bug"),
        }
        state.snake.pop();
    } else {
        state.snake.pop();
    }

    for event in &events {
        log::debug!("tick {}: {:?}", state.time_ticks, event);
    }
    events
}

fn game_over(state: &mut GameState, reason: GameOverReason, score: u32, events: &mut Vec<GameEvent>) {
    state.phase = GamePhase::GameOver;
    state.game_over_reason = Some(reason);
    log::info!("Game over ({reason:?}) with score {score}");
    events.push(GameEvent::GameOver { reason, score });
}

fn spawn_failed(what: &str) {
    log::error!("No free cell left to spawn {what}");
    debug_assert!(false, "no free cell left to spawn {what}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{ChallengeTile, Position};

    fn running(seed: u64) -> GameState {
        let mut state = GameState::new(seed);
        state.phase = GamePhase::Running;
        state
    }

    fn step(state: &mut GameState) -> Vec<GameEvent> {
        tick(state, &TickInput::default(), &Catalog::builtin())
    }

    #[test]
    fn test_plain_move_keeps_length() {
        let mut state = running(1);
        step(&mut state);
        assert_eq!(state.snake, [Position::new(8, 7)]);
        assert_eq!(state.time_ticks, 1);
    }

    #[test]
    fn test_no_step_unless_running() {
        let mut state = GameState::new(1);
        let before = state.clone();
        assert!(step(&mut state).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_food_grows_and_respawns() {
        let mut state = running(1);
        state.food = vec![Position::new(8, 7)];
        let events = step(&mut state);
        assert_eq!(state.snake.len(), 2);
        assert_eq!(state.score, FOOD_POINTS);
        assert_eq!(state.food.len(), 1);
        assert_ne!(state.food[0], Position::new(8, 7));
        assert!(matches!(events[1], GameEvent::FoodSpawned { .. }));
    }

    #[test]
    fn test_wall_rejected_before_move() {
        let mut state = running(1);
        state.snake = vec![Position::new(14, 7)];
        let events = step(&mut state);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.game_over_reason, Some(GameOverReason::Wall));
        assert_eq!(state.snake, [Position::new(14, 7)]);
        assert_eq!(
            events,
            [GameEvent::GameOver {
                reason: GameOverReason::Wall,
                score: 0
            }]
        );
    }

    #[test]
    fn test_reversal_is_self_collision() {
        let mut state = running(1);
        state.snake = vec![Position::new(7, 7), Position::new(6, 7)];
        tick(
            &mut state,
            &TickInput {
                turn: Some(Direction::Left),
            },
            &Catalog::builtin(),
        );
        assert_eq!(state.game_over_reason, Some(GameOverReason::SelfCollision));
    }

    #[test]
    fn test_challenge_tile_opens_exercise() {
        let mut state = running(1);
        state.challenges = vec![ChallengeTile {
            pos: Position::new(8, 7),
            slot: 4,
        }];
        step(&mut state);
        assert_eq!(state.phase, GamePhase::ChallengeActive);
        let active = state.active_challenge.clone().unwrap();
        assert_eq!(active.challenge_id, "find-bug");
        assert_eq!(active.tile, Position::new(8, 7));
        // Tile stays until solved
        assert_eq!(state.challenges.len(), 1);
        assert_eq!(state.snake.len(), 1);
    }

    #[test]
    fn test_bug_with_low_score_ends_run() {
        let mut state = running(1);
        state.score = 15;
        state.bugs = vec![Position::new(8, 7)];
        let events = step(&mut state);
        assert_eq!(state.score, 0);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(events.contains(&GameEvent::GameOver {
            reason: GameOverReason::Bug,
            score: 15
        }));
    }

    #[test]
    fn test_bug_with_enough_score_shrinks() {
        let mut state = running(1);
        state.score = 25;
        state.snake = (0..5).map(|i| Position::new(7 - i, 7)).collect();
        state.bugs = vec![Position::new(8, 7)];
        step(&mut state);
        assert_eq!(state.score, 5);
        assert_eq!(state.phase, GamePhase::Running);
        assert_eq!(state.snake.len(), 4);
        assert_eq!(state.snake[0], Position::new(8, 7));
    }

    #[test]
    fn test_bug_never_empties_snake() {
        let mut state = running(1);
        state.score = 40;
        state.bugs = vec![Position::new(8, 7)];
        step(&mut state);
        assert_eq!(state.snake, [Position::new(8, 7)]);
    }

    #[test]
    fn test_bug_floor_restored_on_plain_move() {
        let mut state = running(1);
        state.bugs.pop();
        let events = step(&mut state);
        assert_eq!(state.bugs.len(), BUG_FLOOR);
        assert!(matches!(events[0], GameEvent::BugSpawned { .. }));
        assert_eq!(state.snake.len(), 1);
    }

    #[test]
    fn test_countdown_zero_enters_running() {
        let mut state = GameState::new(1);
        state.phase = GamePhase::Countdown;
        state.countdown = Some(0);
        assert_eq!(step(&mut state), [GameEvent::Resumed]);
        assert_eq!(state.phase, GamePhase::Running);
        assert_eq!(state.snake, [Position::new(7, 7)]);
    }
}
