use std::sync::Arc;

use hs_runner::*;
use hs_search::{ExploreExploitOptimizer, RandomSeed, SearchStrategy};
use hs_types::{ModelScore, SearchSpace};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Hypersweep basic search");

    let data = synthetic_regression(300, 7);
    println!("Generated {} samples", data.len());

    let space = SearchSpace::builder()
        .add_values("learning_rate", [0.01, 0.05, 0.1])
        .add_values("epochs", [100i64, 400])
        .build()?;

    // Exhaustive grid on a small pool
    let grid = SearchStrategy::grid(space.clone()).with_workers(2);
    let mut orchestrator = SearchOrchestrator::builder(LinearSgd::new(), grid, ModelScore)
        .plugin(ResourceMonitor::new())
        .build()?;
    let outcome = orchestrator.search(&data.x, &data.y)?;
    println!(
        "Grid: {} trials, best #{} score={:.4}",
        outcome.trials.len(),
        outcome.best.trial_id(),
        outcome.best_score()
    );

    // Sequential search with the bundled optimizer
    let optimizer = Arc::new(ExploreExploitOptimizer::new(0.3, RandomSeed::Fixed(1)));
    let sequential = SearchStrategy::sequential(space, 8, optimizer)?;
    let mut orchestrator = SearchOrchestrator::builder(LinearSgd::new(), sequential, ModelScore)
        .tracker(MemoryTracker::new())
        .build()?;
    let outcome = orchestrator.search(&data.x, &data.y)?;
    println!(
        "Sequential: best #{} score={:.4} params={:?}",
        outcome.best.trial_id(),
        outcome.best_score(),
        outcome.best_params()
    );

    Ok(())
}
