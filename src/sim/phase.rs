//! Phase transitions driven by commands and the countdown pulse
//!
//! Arena-driven transitions (challenge entry, game over) happen in `tick`;
//! everything the player or the countdown timer triggers lives here.

use super::state::{ActiveChallenge, GameEvent, GamePhase, GameState};

/// Play/pause button
///
/// Running pauses to Idle. Idle starts a countdown; pressing again during a
/// countdown restarts it. Ignored while a challenge is open or the run is over.
pub fn toggle_play(state: &mut GameState, countdown_start: u8) -> Option<GameEvent> {
    match state.phase {
        GamePhase::Running => {
            state.phase = GamePhase::Idle;
            state.countdown = None;
            log::info!("Paused at tick {}", state.time_ticks);
            Some(GameEvent::Paused)
        }
        GamePhase::Idle | GamePhase::Countdown => {
            state.phase = GamePhase::Countdown;
            state.countdown = Some(countdown_start);
            log::info!("Countdown from {countdown_start}");
            Some(GameEvent::Countdown {
                remaining: countdown_start,
            })
        }
        GamePhase::ChallengeActive | GamePhase::GameOver => None,
    }
}

/// One countdown pulse: decrement, or start running once it reads zero
pub fn countdown_tick(state: &mut GameState) -> Option<GameEvent> {
    if state.phase != GamePhase::Countdown {
        return None;
    }
    match state.countdown {
        Some(remaining) if remaining > 0 => {
            let remaining = remaining - 1;
            state.countdown = Some(remaining);
            Some(GameEvent::Countdown { remaining })
        }
        _ => {
            state.countdown = None;
            state.phase = GamePhase::Running;
            log::info!("Countdown finished, running");
            Some(GameEvent::Resumed)
        }
    }
}

/// Close a solved challenge: its tile leaves the grid and play resumes.
/// Scoring is the progress tracker's job.
pub fn complete_challenge(state: &mut GameState) -> Option<ActiveChallenge> {
    if state.phase != GamePhase::ChallengeActive {
        return None;
    }
    let active = state.active_challenge.take()?;
    state.challenges.retain(|tile| tile.pos != active.tile);
    state.phase = GamePhase::Running;
    log::info!("Challenge {} solved, tile removed", active.challenge_id);
    Some(active)
}

/// Close a challenge without solving it; the tile stays where it was
pub fn dismiss_challenge(state: &mut GameState) -> Option<GameEvent> {
    if state.phase != GamePhase::ChallengeActive {
        return None;
    }
    let active = state.active_challenge.take()?;
    state.phase = GamePhase::Running;
    log::info!("Challenge {} skipped", active.challenge_id);
    Some(GameEvent::ChallengeSkipped {
        challenge_id: active.challenge_id,
    })
}

/// Back to the initial configuration of this run's seed
pub fn reset(state: &mut GameState) -> GameEvent {
    *state = GameState::new(state.seed);
    log::info!("Game reset (seed {})", state.seed);
    GameEvent::Reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Position;

    fn with_challenge() -> GameState {
        let mut state = GameState::new(5);
        state.phase = GamePhase::ChallengeActive;
        state.active_challenge = Some(ActiveChallenge {
            slot: 1,
            tile: Position::new(11, 5),
            challenge_id: "find-bug".into(),
        });
        state
    }

    #[test]
    fn test_toggle_cycle() {
        let mut state = GameState::new(5);
        assert_eq!(
            toggle_play(&mut state, 3),
            Some(GameEvent::Countdown { remaining: 3 })
        );
        assert_eq!(countdown_tick(&mut state), Some(GameEvent::Countdown { remaining: 2 }));
        // Pressing again restarts the countdown
        toggle_play(&mut state, 3);
        assert_eq!(state.countdown, Some(3));

        for _ in 0..3 {
            countdown_tick(&mut state);
        }
        assert_eq!(state.countdown, Some(0));
        assert_eq!(countdown_tick(&mut state), Some(GameEvent::Resumed));
        assert_eq!(state.phase, GamePhase::Running);

        assert_eq!(toggle_play(&mut state, 3), Some(GameEvent::Paused));
        assert_eq!(state.phase, GamePhase::Idle);
        assert_eq!(state.countdown, None);
    }

    #[test]
    fn test_toggle_ignored_during_challenge_and_game_over() {
        let mut state = with_challenge();
        assert_eq!(toggle_play(&mut state, 3), None);
        state.phase = GamePhase::GameOver;
        assert_eq!(toggle_play(&mut state, 3), None);
    }

    #[test]
    fn test_complete_removes_only_that_tile() {
        let mut state = with_challenge();
        let active = complete_challenge(&mut state).unwrap();
        assert_eq!(active.challenge_id, "find-bug");
        assert_eq!(state.challenges.len(), 2);
        assert!(state.challenges.iter().all(|c| c.pos != Position::new(11, 5)));
        assert_eq!(state.phase, GamePhase::Running);
    }

    #[test]
    fn test_dismiss_keeps_tile() {
        let mut state = with_challenge();
        assert!(dismiss_challenge(&mut state).is_some());
        assert_eq!(state.challenges.len(), 3);
        assert_eq!(state.phase, GamePhase::Running);
        assert!(state.active_challenge.is_none());
    }

    #[test]
    fn test_reset_is_initial_configuration() {
        let mut state = with_challenge();
        state.score = 120;
        state.snake.push(Position::new(6, 7));
        reset(&mut state);
        assert_eq!(state, GameState::new(5));
        reset(&mut state);
        assert_eq!(state, GameState::new(5));
    }
}
