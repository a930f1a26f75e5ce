//! Headless demo driver
//!
//! Grades every bundled reference solution, then plays an autopilot run that
//! steers toward food and challenge tiles and solves each challenge it opens.
//! Set `CODE_QUEST_SETTINGS` to a settings JSON path and `RUST_LOG=debug` for
//! per-tick logging.

use std::sync::Arc;
use std::time::Duration;

use code_quest::evaluator::all_passed;
use code_quest::sim::{Direction, GamePhase, GameState, Position, in_bounds};
use code_quest::{Catalog, Engine, Evaluator, MemoryProgressStore, Settings};

/// Arena pulses the autopilot plays before stopping
const DEMO_TICKS: u32 = 400;

fn main() {
    env_logger::init();
    log::info!("Code Quest (headless) starting...");

    let settings = std::env::var("CODE_QUEST_SETTINGS")
        .map(Settings::load)
        .unwrap_or_default();
    let catalog = Arc::new(Catalog::builtin());

    println!("\nGrading reference solutions...");
    let evaluator = Evaluator::new(settings.evaluator_config());
    for challenge in catalog.all() {
        let results = evaluator.evaluate(challenge, &challenge.solution);
        let mark = if all_passed(&results) { "✓" } else { "✗" };
        println!("{mark} {} ({} tests)", challenge.title, results.len());
        for result in &results {
            println!("    {}", result.message);
        }
    }

    let mut store = MemoryProgressStore::new();
    store.register("demo", "Demo Player");
    let mut engine = Engine::new(settings.clone(), Arc::clone(&catalog), Box::new(store));
    if let Err(err) = engine.sign_in("demo") {
        log::warn!("Playing anonymously: {err}");
    }

    println!("\nAutopilot run...");
    engine.toggle_play();
    let pulse = Duration::from_millis(settings.tick_interval_ms.max(1));
    let mut ticks = 0;
    while ticks < DEMO_TICKS {
        match engine.state().phase {
            GamePhase::GameOver => break,
            GamePhase::ChallengeActive => {
                let solution = engine
                    .active_challenge()
                    .map(|c| c.solution.clone())
                    .unwrap_or_default();
                if let Some(hint) = engine.next_hint() {
                    println!("  hint: {hint}");
                }
                match engine.submit(&solution).event {
                    Some(event) => log::info!("{event:?}"),
                    None => {
                        engine.skip_challenge();
                    }
                }
            }
            GamePhase::Running => {
                if let Some(direction) = autopilot(engine.state()) {
                    engine.turn(direction);
                }
                engine.advance(pulse);
                ticks += 1;
            }
            GamePhase::Idle | GamePhase::Countdown => {
                engine.advance(pulse);
            }
        }
    }

    let snapshot = engine.snapshot();
    println!("\n{}", snapshot.ascii());
    println!(
        "Score {} | phase {} | solved {} | ticks {}",
        snapshot.score,
        snapshot.phase.as_str(),
        engine.solved_count(),
        snapshot.time_ticks
    );
    match engine.leaderboard() {
        Ok(board) if board.is_empty() => println!("Leaderboard is empty"),
        Ok(board) => {
            for (rank, entry) in board.entries.iter().enumerate() {
                println!("#{} {} {}", rank + 1, entry.username, entry.score);
            }
            if let (Some(top), Some(rank)) = (board.top_score(), board.rank_of("demo")) {
                println!("Demo Player ranks #{rank} (top score {top})");
            }
        }
        Err(err) => log::warn!("Leaderboard unavailable: {err}"),
    }
    match snapshot.to_json() {
        Ok(json) => log::debug!("Final snapshot:\n{json}"),
        Err(err) => log::error!("Snapshot export failed: {err}"),
    }
}

/// Greedy steering: head for the nearest food or unsolved tile, avoiding
/// walls, the body and bugs where possible
fn autopilot(state: &GameState) -> Option<Direction> {
    let head = state.head();
    let targets: Vec<Position> = state
        .food
        .iter()
        .copied()
        .chain(state.challenges.iter().map(|c| c.pos))
        .collect();
    let goal = targets
        .iter()
        .min_by_key(|t| (**t - head).abs().element_sum())
        .copied()?;

    let safe = |d: Direction| {
        let next = head + d.delta();
        in_bounds(next) && !state.snake.contains(&next) && !state.bugs.contains(&next)
    };
    let candidates = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
    candidates
        .into_iter()
        .filter(|&d| safe(d))
        .min_by_key(|&d| (head + d.delta() - goal).abs().element_sum())
        .or_else(|| {
            candidates.into_iter().find(|&d| {
                let next = head + d.delta();
                in_bounds(next) && !state.snake.contains(&next)
            })
        })
}
