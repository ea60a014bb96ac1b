use anyhow::Context;

use hs_runner::{
    init_tracing, leaderboard, synthetic_regression, LinearSgd, OrchestratorBuilder,
    ResourceMonitor, RunConfig,
};
use hs_search::format_params;
use hs_types::ModelScore;

fn load_config() -> anyhow::Result<RunConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HS_CONFIG").ok());
    match path {
        Some(path) => RunConfig::from_json_file(&path)
            .with_context(|| format!("failed to load run config from {path}")),
        None => Ok(RunConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.verbose);

    let data = synthetic_regression(500, 42);
    let mut orchestrator = OrchestratorBuilder::from_config(LinearSgd::new(), ModelScore, &config)?
        .plugin(ResourceMonitor::new())
        .build()?;

    let outcome = orchestrator.search(&data.x, &data.y)?;

    println!("Run {} finished ({:?})", outcome.run_id, outcome.stop_reason);
    println!("Top trials:");
    for trial in leaderboard(&outcome.trials).into_iter().take(5) {
        println!(
            "  #{:<3} score={:.4} duration={:.3}s params={}",
            trial.trial_id(),
            trial.score(),
            trial.duration(),
            format_params(trial.params())
        );
    }
    if !outcome.failed.is_empty() {
        println!("{} trial(s) failed and were skipped", outcome.failed.len());
    }
    println!(
        "Best: trial {} score={:.4} weights={:?} bias={:.3} (true weights {:?})",
        outcome.best.trial_id(),
        outcome.best_score(),
        outcome.model.weights(),
        outcome.model.bias(),
        data.true_weights
    );
    Ok(())
}
