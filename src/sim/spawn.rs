//! Entity placement on free cells

use rand::Rng;

use super::state::{GameState, Position};
use crate::consts::GRID_SIZE;

/// Random probes before falling back to enumerating free cells
const SPAWN_ATTEMPTS: usize = 64;

/// Pick a uniformly random unoccupied cell, or `None` when the grid is full
pub fn random_free_cell(state: &mut GameState) -> Option<Position> {
    let mut rng = state.rng_state.next_rng();

    for _ in 0..SPAWN_ATTEMPTS {
        let pos = Position::new(rng.random_range(0..GRID_SIZE), rng.random_range(0..GRID_SIZE));
        if state.is_free(pos) {
            return Some(pos);
        }
    }

    // Crowded grid: choose among what is left
    let free: Vec<Position> = (0..GRID_SIZE)
        .flat_map(|y| (0..GRID_SIZE).map(move |x| Position::new(x, y)))
        .filter(|&pos| state.is_free(pos))
        .collect();
    if free.is_empty() {
        return None;
    }
    Some(free[rng.random_range(0..free.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_is_free_and_deterministic() {
        let mut a = GameState::new(99);
        let mut b = GameState::new(99);
        let pa = random_free_cell(&mut a).unwrap();
        let pb = random_free_cell(&mut b).unwrap();
        assert_eq!(pa, pb);
        assert!(GameState::new(99).is_free(pa));
    }

    #[test]
    fn test_spawn_in_crowded_grid() {
        let mut state = GameState::new(3);
        state.snake = (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Position::new(x, y)))
            .filter(|&p| p != Position::new(14, 14))
            .collect();
        state.food.clear();
        state.bugs.clear();
        state.challenges.clear();
        assert_eq!(random_free_cell(&mut state), Some(Position::new(14, 14)));
    }

    #[test]
    fn test_spawn_full_grid() {
        let mut state = GameState::new(3);
        state.snake = (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Position::new(x, y)))
            .collect();
        assert_eq!(random_free_cell(&mut state), None);
    }
}
