//! Read-only view of the game for a presentation layer

use serde::Serialize;

use crate::catalog::{Catalog, Category, Difficulty, TestCase};
use crate::consts::GRID_SIZE;
use crate::evaluator::TestResult;
use crate::sim::{Direction, GameOverReason, GamePhase, GameState, Position};

/// What a grid cell shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Empty,
    Snake,
    Food,
    Challenge,
    Bug,
}

/// Cell content; when entities overlap, snake wins over food, food over
/// challenge, challenge over bug
pub fn cell_kind(state: &GameState, pos: Position) -> CellKind {
    if state.snake.contains(&pos) {
        CellKind::Snake
    } else if state.food.contains(&pos) {
        CellKind::Food
    } else if state.challenges.iter().any(|c| c.pos == pos) {
        CellKind::Challenge
    } else if state.bugs.contains(&pos) {
        CellKind::Bug
    } else {
        CellKind::Empty
    }
}

/// A non-snake entity on the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCell {
    pub pos: Position,
    pub kind: CellKind,
}

/// The open exercise as the challenge panel shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Category,
    pub language: String,
    pub template: String,
    pub points: u32,
    pub tests: Vec<TestCase>,
    /// Hints revealed so far, in order
    pub hints: Vec<String>,
    pub hints_total: usize,
    pub learning_objectives: Vec<String>,
    pub common_mistakes: Vec<String>,
    pub solved_before: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub grid_size: i32,
    /// Head first
    pub snake: Vec<Position>,
    pub direction: Direction,
    pub entities: Vec<EntityCell>,
    pub score: u32,
    pub level: u32,
    pub phase: GamePhase,
    pub game_over_reason: Option<GameOverReason>,
    pub countdown: Option<u8>,
    pub challenge: Option<ChallengeView>,
    /// Latest submission verdicts
    pub results: Vec<TestResult>,
    pub solved: Vec<String>,
    pub time_ticks: u64,
}

impl RenderSnapshot {
    pub fn capture(
        state: &GameState,
        catalog: &Catalog,
        results: &[TestResult],
        hints_shown: usize,
    ) -> Self {
        let entities = state
            .food
            .iter()
            .map(|&pos| (pos, CellKind::Food))
            .chain(state.challenges.iter().map(|c| (c.pos, CellKind::Challenge)))
            .chain(state.bugs.iter().map(|&pos| (pos, CellKind::Bug)))
            .map(|(pos, kind)| EntityCell { pos, kind })
            .collect();

        let challenge = state.active_challenge.as_ref().map(|active| {
            let c = catalog.by_index(active.slot);
            ChallengeView {
                id: c.id.clone(),
                title: c.title.clone(),
                description: c.description.clone(),
                difficulty: c.difficulty,
                category: c.category,
                language: c.language.clone(),
                template: c.template.clone(),
                points: c.points,
                tests: c.test_cases.clone(),
                hints: c.hints.iter().take(hints_shown).cloned().collect(),
                hints_total: c.hints.len(),
                learning_objectives: c.learning_objectives.clone(),
                common_mistakes: c.common_mistakes.clone(),
                solved_before: state.solved.contains(&c.id),
            }
        });

        Self {
            grid_size: GRID_SIZE,
            snake: state.snake.clone(),
            direction: state.direction,
            entities,
            score: state.score,
            level: state.level,
            phase: state.phase,
            game_over_reason: state.game_over_reason,
            countdown: state.countdown,
            challenge,
            results: results.to_vec(),
            solved: state.solved.iter().cloned().collect(),
            time_ticks: state.time_ticks,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Text rendering of the board: `@` head, `o` body, `*` food, `?` challenge, `x` bug
    pub fn ascii(&self) -> String {
        let mut out = String::new();
        for y in 0..self.grid_size {
            for x in 0..self.grid_size {
                let pos = Position::new(x, y);
                let glyph = if self.snake.first() == Some(&pos) {
                    '@'
                } else if self.snake.contains(&pos) {
                    'o'
                } else {
                    match self.entities.iter().find(|e| e.pos == pos).map(|e| e.kind) {
                        Some(CellKind::Food) => '*',
                        Some(CellKind::Challenge) => '?',
                        Some(CellKind::Bug) => 'x',
                        _ => '.',
                    }
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ActiveChallenge;

    #[test]
    fn test_cell_priority() {
        let mut state = GameState::new(1);
        assert_eq!(cell_kind(&state, Position::new(7, 7)), CellKind::Snake);
        assert_eq!(cell_kind(&state, Position::new(12, 10)), CellKind::Food);
        assert_eq!(cell_kind(&state, Position::new(3, 3)), CellKind::Challenge);
        assert_eq!(cell_kind(&state, Position::new(8, 11)), CellKind::Bug);
        assert_eq!(cell_kind(&state, Position::new(0, 0)), CellKind::Empty);
        state.bugs.push(Position::new(12, 10));
        assert_eq!(cell_kind(&state, Position::new(12, 10)), CellKind::Food);
    }

    #[test]
    fn test_capture_initial() {
        let snapshot = RenderSnapshot::capture(&GameState::new(1), &Catalog::builtin(), &[], 0);
        assert_eq!(snapshot.grid_size, 15);
        assert_eq!(snapshot.entities.len(), 7);
        assert!(snapshot.challenge.is_none());
        let board = snapshot.ascii();
        assert_eq!(board.lines().count(), 15);
        assert_eq!(board.lines().nth(7).and_then(|l| l.chars().nth(7)), Some('@'));
    }

    #[test]
    fn test_capture_challenge_hints() {
        let mut state = GameState::new(1);
        state.phase = GamePhase::ChallengeActive;
        state.active_challenge = Some(ActiveChallenge {
            slot: 2,
            tile: Position::new(6, 12),
            challenge_id: "list-comprehension".into(),
        });
        let snapshot = RenderSnapshot::capture(&state, &Catalog::builtin(), &[], 2);
        let view = snapshot.challenge.unwrap();
        assert_eq!(view.id, "list-comprehension");
        assert_eq!(view.hints.len(), 2);
        assert_eq!(view.hints_total, 5);
        assert!(!view.solved_before);
    }

    #[test]
    fn test_json_phase_names() {
        let snapshot = RenderSnapshot::capture(&GameState::new(1), &Catalog::builtin(), &[], 0);
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"phase\": \"Idle\""));
        assert!(json.contains("\"kind\": \"bug\""));
    }
}
