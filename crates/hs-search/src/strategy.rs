//! Search strategies.
//!
//! A [`SearchStrategy`] decides which assignments to try and in what order,
//! runs each one through the trial protocol and notifies plugins after
//! every completed trial.

use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use hs_types::{Evaluator, HsError, HsResult, ParamMap, SearchSpace, Trainable, TrialResult};

use crate::candidates::{Candidate, GridCandidates, RandomCandidates, RandomSeed};
use crate::context::{LogLevel, RunContext};
use crate::control::{RunClock, RunControl, StopReason};
use crate::plugins::{Hook, PluginManager};
use crate::protocol::{FailedTrial, FailurePolicy, TrialInputs};
use crate::sequential::{Direction, SequentialOptimizer};

/// The search algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Grid,
    Random,
    SequentialModelBased,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Random => "random",
            Self::SequentialModelBased => "sequential",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = HsError;

    fn from_str(s: &str) -> HsResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "random" => Ok(Self::Random),
            "sequential" | "sequential_model_based" | "smbo" | "optuna" => {
                Ok(Self::SequentialModelBased)
            }
            other => Err(HsError::Configuration(format!(
                "Unknown search strategy: {other}"
            ))),
        }
    }
}

/// Ordered output of one strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    /// Completed trials in emission order (sorted by id for pooled runs).
    pub trials: Vec<TrialResult>,
    /// Trials skipped under [`FailurePolicy::Skip`].
    pub failed: Vec<FailedTrial>,
    pub stop_reason: StopReason,
}

/// A configured search over one space.
#[derive(Clone)]
pub struct SearchStrategy {
    kind: StrategyKind,
    space: SearchSpace,
    n_trials: usize,
    name: String,
    seed: RandomSeed,
    workers: usize,
    failure_policy: FailurePolicy,
    optimizer: Option<Arc<dyn SequentialOptimizer>>,
}

impl SearchStrategy {
    /// `n_trials` must be positive for sampled and sequential search; grid
    /// search ignores it.
    pub fn new(kind: StrategyKind, space: SearchSpace, n_trials: usize) -> HsResult<Self> {
        if kind != StrategyKind::Grid && n_trials == 0 {
            return Err(HsError::Configuration(format!(
                "{kind} search needs at least one trial"
            )));
        }
        Ok(Self {
            kind,
            space,
            n_trials,
            name: kind.as_str().to_string(),
            seed: RandomSeed::default(),
            workers: 1,
            failure_policy: FailurePolicy::default(),
            optimizer: None,
        })
    }

    pub fn grid(space: SearchSpace) -> Self {
        Self {
            kind: StrategyKind::Grid,
            space,
            n_trials: 0,
            name: StrategyKind::Grid.as_str().to_string(),
            seed: RandomSeed::default(),
            workers: 1,
            failure_policy: FailurePolicy::default(),
            optimizer: None,
        }
    }

    pub fn random(space: SearchSpace, n_trials: usize, seed: RandomSeed) -> HsResult<Self> {
        Ok(Self::new(StrategyKind::Random, space, n_trials)?.with_seed(seed))
    }

    pub fn sequential(
        space: SearchSpace,
        n_trials: usize,
        optimizer: Arc<dyn SequentialOptimizer>,
    ) -> HsResult<Self> {
        Ok(Self::new(StrategyKind::SequentialModelBased, space, n_trials)?
            .with_optimizer(optimizer))
    }

    /// Parse the strategy kind from a user-facing name.
    pub fn from_name(kind: &str, space: SearchSpace, n_trials: usize) -> HsResult<Self> {
        Self::new(kind.parse()?, space, n_trials)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: RandomSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Size of the worker pool for grid and random search. Sequential
    /// search always runs on the calling thread.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn SequentialOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn n_trials(&self) -> usize {
        self.n_trials
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> RandomSeed {
        self.seed
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Number of trials the strategy will attempt if not stopped early.
    pub fn planned_trials(&self) -> Option<usize> {
        match self.kind {
            StrategyKind::Grid => self.space.grid_size(),
            _ => Some(self.n_trials),
        }
    }

    /// Run every trial and return the completed results.
    pub fn run<M, E>(
        &self,
        inputs: &TrialInputs<'_, M, E>,
        plugins: &mut PluginManager,
        ctx: &RunContext,
        control: &RunControl,
    ) -> HsResult<StrategyRun>
    where
        M: Trainable,
        E: Evaluator<M> + ?Sized,
    {
        info!(
            strategy = %self.kind,
            name = %self.name,
            planned = ?self.planned_trials(),
            workers = self.workers,
            "starting search"
        );

        let clock = control.start();
        let mut recorder = Recorder::new(self, plugins, ctx);

        match self.kind {
            StrategyKind::Grid => {
                self.run_independent(GridCandidates::new(&self.space), inputs, &mut recorder, &clock)?
            }
            StrategyKind::Random => self.run_independent(
                RandomCandidates::new(&self.space, self.n_trials, self.seed),
                inputs,
                &mut recorder,
                &clock,
            )?,
            StrategyKind::SequentialModelBased => {
                self.run_sequential(inputs, &mut recorder, &clock)?
            }
        }

        let run = recorder.finish();
        info!(
            completed = run.trials.len(),
            failed = run.failed.len(),
            stop_reason = ?run.stop_reason,
            elapsed_secs = clock.elapsed().as_secs_f64(),
            "search finished"
        );
        Ok(run)
    }

    fn run_independent<M, E, I>(
        &self,
        candidates: I,
        inputs: &TrialInputs<'_, M, E>,
        recorder: &mut Recorder<'_>,
        clock: &RunClock,
    ) -> HsResult<()>
    where
        M: Trainable,
        E: Evaluator<M> + ?Sized,
        I: Iterator<Item = Candidate>,
    {
        if self.workers > 1 {
            return self.run_pooled(candidates.collect(), inputs, recorder, clock);
        }

        for Candidate { trial_id, params } in candidates {
            if let Some(reason) = clock.should_stop() {
                recorder.stopped(reason);
                break;
            }
            let outcome = inputs.execute(trial_id, params.clone());
            recorder.accept(trial_id, params, outcome)?;
        }
        Ok(())
    }

    /// Fan trials out over a bounded pool. Completions are handled on the
    /// calling thread in completion order; results are re-sorted by id at
    /// the end so selection never depends on scheduling.
    fn run_pooled<M, E>(
        &self,
        candidates: Vec<Candidate>,
        inputs: &TrialInputs<'_, M, E>,
        recorder: &mut Recorder<'_>,
        clock: &RunClock,
    ) -> HsResult<()>
    where
        M: Trainable,
        E: Evaluator<M> + ?Sized,
    {
        enum Message {
            Done {
                trial_id: u64,
                params: ParamMap,
                outcome: HsResult<TrialResult>,
            },
            NotStarted(StopReason),
            Halted,
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("hs-trial-{i}"))
            .build()
            .map_err(|e| HsError::Internal(format!("failed to start worker pool: {e}")))?;

        let halted = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded::<Message>();
        let mut first_error: Option<HsError> = None;

        pool.in_place_scope(|scope| {
            for Candidate { trial_id, params } in candidates {
                let tx = tx.clone();
                let halted = &halted;
                scope.spawn(move |_| {
                    let message = if halted.load(Ordering::SeqCst) {
                        Message::Halted
                    } else if let Some(reason) = clock.should_stop() {
                        Message::NotStarted(reason)
                    } else {
                        let outcome = inputs.execute(trial_id, params.clone());
                        Message::Done {
                            trial_id,
                            params,
                            outcome,
                        }
                    };
                    let _ = tx.send(message);
                });
            }
            drop(tx);

            for message in rx.iter() {
                match message {
                    Message::Done {
                        trial_id,
                        params,
                        outcome,
                    } => {
                        if first_error.is_some() {
                            continue;
                        }
                        if let Err(e) = recorder.accept(trial_id, params, outcome) {
                            halted.store(true, Ordering::SeqCst);
                            first_error = Some(e);
                        }
                    }
                    Message::NotStarted(reason) => recorder.stopped(reason),
                    Message::Halted => {}
                }
            }
        });

        recorder.sort_by_trial_id();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run_sequential<M, E>(
        &self,
        inputs: &TrialInputs<'_, M, E>,
        recorder: &mut Recorder<'_>,
        clock: &RunClock,
    ) -> HsResult<()>
    where
        M: Trainable,
        E: Evaluator<M> + ?Sized,
    {
        let optimizer = self
            .optimizer
            .as_ref()
            .ok_or_else(|| HsError::MissingDependency {
                name: "sequential optimizer".to_string(),
            })?;
        if self.workers > 1 {
            debug!(workers = self.workers, "sequential search ignores the worker pool");
        }

        let mut session = optimizer.create_session(Direction::Maximize, &self.space)?;
        let mut seen = HashSet::new();
        let mut accepted = 0;

        while accepted < self.n_trials {
            if let Some(reason) = clock.should_stop() {
                recorder.stopped(reason);
                break;
            }

            let suggestion = session.suggest()?;
            let trial_id = suggestion.trial_number;
            if trial_id == 0 || !seen.insert(trial_id) {
                return Err(HsError::Configuration(format!(
                    "optimizer {} produced invalid trial number {trial_id}",
                    optimizer.name()
                )));
            }
            if let Some(unknown) = suggestion.params.keys().find(|k| !self.space.contains(k)) {
                return Err(HsError::Configuration(format!(
                    "optimizer {} suggested unknown parameter {unknown}",
                    optimizer.name()
                )));
            }
            accepted += 1;

            let outcome = inputs.execute(trial_id, suggestion.params.clone());
            match recorder.accept(trial_id, suggestion.params, outcome)? {
                Some(score) => session.report(trial_id, score)?,
                None => session.report_failure(trial_id)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchStrategy")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("n_trials", &self.n_trials)
            .field("seed", &self.seed)
            .field("workers", &self.workers)
            .field("failure_policy", &self.failure_policy)
            .field("optimizer", &self.optimizer.as_ref().map(|o| o.name().to_string()))
            .field("space", &self.space)
            .finish()
    }
}

/// Collects trial outcomes, applies the failure policy and fans out
/// notifications.
struct Recorder<'a> {
    label: String,
    policy: FailurePolicy,
    plugins: &'a mut PluginManager,
    ctx: &'a RunContext,
    trials: Vec<TrialResult>,
    failed: Vec<FailedTrial>,
    stop_reason: StopReason,
}

impl<'a> Recorder<'a> {
    fn new(strategy: &SearchStrategy, plugins: &'a mut PluginManager, ctx: &'a RunContext) -> Self {
        Self {
            label: capitalize(strategy.name()),
            policy: strategy.failure_policy,
            plugins,
            ctx,
            trials: Vec::new(),
            failed: Vec::new(),
            stop_reason: StopReason::Completed,
        }
    }

    /// Returns the score of a completed trial, `None` for a skipped
    /// failure, or the error when the run must end.
    fn accept(
        &mut self,
        trial_id: u64,
        params: ParamMap,
        outcome: HsResult<TrialResult>,
    ) -> HsResult<Option<f64>> {
        match outcome {
            Ok(result) => {
                let score = result.score();
                debug!(trial_id, score, duration = result.duration(), "trial complete");
                self.ctx.log(
                    LogLevel::Info,
                    format!(
                        "{} trial {}: params={} score={:.4} duration={:.2}s",
                        self.label,
                        trial_id,
                        format_params(&params),
                        score,
                        result.duration()
                    ),
                );
                self.ctx.trial(&result);
                self.plugins.trigger(Hook::EpochEnd(result.metrics()));
                self.trials.push(result);
                Ok(Some(score))
            }
            Err(e) if e.is_trial_failure() && self.policy == FailurePolicy::Skip => {
                warn!(trial_id, error = %e, "skipping failed trial");
                self.ctx.log(
                    LogLevel::Warning,
                    format!("{} trial {} skipped: {}", self.label, trial_id, e),
                );
                self.failed.push(FailedTrial {
                    trial_id,
                    params,
                    error: e.to_string(),
                });
                Ok(None)
            }
            Err(e) => {
                self.ctx.log(
                    LogLevel::Error,
                    format!("{} trial {} failed: {}", self.label, trial_id, e),
                );
                Err(e)
            }
        }
    }

    fn stopped(&mut self, reason: StopReason) {
        if self.stop_reason == StopReason::Completed {
            info!(?reason, "search stopping early");
            self.stop_reason = reason;
        }
    }

    fn sort_by_trial_id(&mut self) {
        self.trials.sort_by_key(TrialResult::trial_id);
        self.failed.sort_by_key(|f| f.trial_id);
    }

    fn finish(self) -> StrategyRun {
        StrategyRun {
            trials: self.trials,
            failed: self.failed,
            stop_reason: self.stop_reason,
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `key=value` pairs in key order, comma separated.
pub fn format_params(params: &ParamMap) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ChannelSink;
    use crate::control::CancellationToken;
    use crate::plugins::{Plugin, PluginResult};
    use crate::sequential::{ExploreExploitOptimizer, OptimizerSession, Suggestion};
    use crossbeam_channel::unbounded;
    use hs_types::{MetricMap, ModelDescriptor, ParamValue};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone)]
    struct Quadratic {
        a: i64,
        b: i64,
        fits: Arc<AtomicUsize>,
    }

    impl Quadratic {
        fn new() -> Self {
            Self {
                a: 0,
                b: 0,
                fits: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn fit_count(&self) -> usize {
            self.fits.load(Ordering::SeqCst)
        }
    }

    impl Trainable for Quadratic {
        type Input = [f64];
        type Target = [f64];

        fn descriptor(&self) -> hs_types::ModelDescriptor {
            ModelDescriptor::cpu("Quadratic")
        }

        fn params(&self) -> ParamMap {
            ParamMap::from([
                ("a".to_string(), ParamValue::Int(self.a)),
                ("b".to_string(), ParamValue::Int(self.b)),
            ])
        }

        fn clone_with(&self, overrides: &ParamMap) -> HsResult<Self> {
            let mut next = self.clone();
            for (key, value) in overrides {
                let v = value
                    .as_i64()
                    .ok_or_else(|| HsError::Configuration(format!("{key} must be an integer")))?;
                match key.as_str() {
                    "a" => next.a = v,
                    "b" => next.b = v,
                    other => {
                        return Err(HsError::Configuration(format!("unknown parameter {other}")))
                    }
                }
            }
            Ok(next)
        }

        fn fit(&mut self, _x: &[f64], _y: &[f64]) -> HsResult<()> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Peaks at a=2, b=20; returns NaN for a == `poison`.
    struct Peak {
        poison: Option<i64>,
    }

    impl Evaluator<Quadratic> for Peak {
        fn evaluate(&self, model: &Quadratic, _x: &[f64], _y: &[f64]) -> HsResult<f64> {
            if Some(model.a) == self.poison {
                return Ok(f64::NAN);
            }
            Ok(-(((model.a - 2).pow(2) + (model.b - 20).pow(2)) as f64))
        }
    }

    struct EpochLog(Arc<Mutex<Vec<f64>>>);

    impl Plugin for EpochLog {
        fn on_epoch_end(&mut self, metrics: &MetricMap) -> PluginResult {
            self.0.lock().push(metrics["score"]);
            Ok(())
        }
    }

    static X: [f64; 3] = [1.0, 2.0, 3.0];

    fn two_by_two() -> SearchSpace {
        SearchSpace::builder()
            .add_values("a", [1, 2])
            .add_values("b", [10, 20])
            .build()
            .unwrap()
    }

    fn run_plain(strategy: &SearchStrategy, model: &Quadratic, eval: &Peak) -> HsResult<StrategyRun> {
        let inputs = TrialInputs::new(model, &X[..], &X[..], eval);
        strategy.run(
            &inputs,
            &mut PluginManager::new(),
            &RunContext::new(false),
            &RunControl::new(),
        )
    }

    fn pairs(run: &StrategyRun) -> Vec<(i64, i64)> {
        run.trials
            .iter()
            .map(|t| {
                (
                    t.params()["a"].as_i64().unwrap(),
                    t.params()["b"].as_i64().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn grid_runs_every_combination_in_order() {
        let model = Quadratic::new();
        let scores = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins.register(Box::new(EpochLog(scores.clone())));

        let strategy = SearchStrategy::grid(two_by_two());
        let eval = Peak { poison: None };
        let inputs = TrialInputs::new(&model, &X[..], &X[..], &eval);
        let run = strategy
            .run(&inputs, &mut plugins, &RunContext::new(false), &RunControl::new())
            .unwrap();

        assert_eq!(pairs(&run), vec![(1, 10), (1, 20), (2, 10), (2, 20)]);
        assert_eq!(
            run.trials.iter().map(TrialResult::trial_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(run.stop_reason, StopReason::Completed);
        assert_eq!(model.fit_count(), 4);

        let expected: Vec<f64> = run.trials.iter().map(TrialResult::score).collect();
        assert_eq!(*scores.lock(), expected);
    }

    #[test]
    fn grid_ignores_n_trials() {
        let strategy = SearchStrategy::new(StrategyKind::Grid, two_by_two(), 1).unwrap();
        let run = run_plain(&strategy, &Quadratic::new(), &Peak { poison: None }).unwrap();
        assert_eq!(run.trials.len(), 4);
        assert_eq!(strategy.planned_trials(), Some(4));
    }

    #[test]
    fn random_runs_requested_trials() {
        let strategy = SearchStrategy::random(two_by_two(), 5, RandomSeed::Fixed(7)).unwrap();
        let run = run_plain(&strategy, &Quadratic::new(), &Peak { poison: None }).unwrap();
        assert_eq!(
            run.trials.iter().map(TrialResult::trial_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let strategy = SearchStrategy::random(two_by_two(), 12, RandomSeed::Fixed(99)).unwrap();
        let first = run_plain(&strategy, &Quadratic::new(), &Peak { poison: None }).unwrap();
        let second = run_plain(&strategy, &Quadratic::new(), &Peak { poison: None }).unwrap();
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn pooled_run_matches_serial_run() {
        let space = SearchSpace::builder()
            .add_values("a", [0, 1, 2, 3])
            .add_values("b", [10, 15, 20, 25])
            .build()
            .unwrap();
        let serial = SearchStrategy::random(space.clone(), 30, RandomSeed::Fixed(4)).unwrap();
        let pooled = serial.clone().with_workers(4);

        let model = Quadratic::new();
        let scores = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins.register(Box::new(EpochLog(scores.clone())));
        let eval = Peak { poison: None };
        let inputs = TrialInputs::new(&model, &X[..], &X[..], &eval);

        let a = run_plain(&serial, &Quadratic::new(), &eval).unwrap();
        let b = pooled
            .run(&inputs, &mut plugins, &RunContext::new(false), &RunControl::new())
            .unwrap();

        assert_eq!(pairs(&a), pairs(&b));
        assert_eq!(
            b.trials.iter().map(TrialResult::trial_id).collect::<Vec<_>>(),
            (1..=30).collect::<Vec<u64>>()
        );
        assert_eq!(scores.lock().len(), 30);
        assert_eq!(model.fit_count(), 30);
    }

    #[test]
    fn pooled_grid_aborts_on_failure() {
        let strategy = SearchStrategy::grid(two_by_two()).with_workers(2);
        let err = run_plain(&strategy, &Quadratic::new(), &Peak { poison: Some(1) }).unwrap_err();
        assert!(matches!(err, HsError::Evaluation { .. }));
    }

    #[test]
    fn nan_aborts_by_default() {
        let strategy = SearchStrategy::grid(two_by_two());
        let model = Quadratic::new();
        let err = run_plain(&strategy, &model, &Peak { poison: Some(1) }).unwrap_err();
        assert!(matches!(err, HsError::Evaluation { trial_id: 1, .. }));
        assert_eq!(model.fit_count(), 1);
    }

    #[test]
    fn nan_is_skipped_under_skip_policy() {
        let strategy = SearchStrategy::grid(two_by_two()).with_failure_policy(FailurePolicy::Skip);
        let run = run_plain(&strategy, &Quadratic::new(), &Peak { poison: Some(1) }).unwrap();

        assert_eq!(pairs(&run), vec![(2, 10), (2, 20)]);
        assert_eq!(
            run.failed.iter().map(|f| f.trial_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(run.failed[0].error.contains("non-finite"));
    }

    #[test]
    fn cancelled_run_starts_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let model = Quadratic::new();
        let eval = Peak { poison: None };
        let inputs = TrialInputs::new(&model, &X[..], &X[..], &eval);

        for workers in [1, 3] {
            let strategy = SearchStrategy::grid(two_by_two()).with_workers(workers);
            let run = strategy
                .run(
                    &inputs,
                    &mut PluginManager::new(),
                    &RunContext::new(false),
                    &RunControl::new().with_token(token.clone()),
                )
                .unwrap();
            assert!(run.trials.is_empty());
            assert_eq!(run.stop_reason, StopReason::Cancelled);
        }
        assert_eq!(model.fit_count(), 0);
    }

    #[test]
    fn exhausted_budget_stops_at_boundary() {
        let model = Quadratic::new();
        let eval = Peak { poison: None };
        let inputs = TrialInputs::new(&model, &X[..], &X[..], &eval);
        let strategy = SearchStrategy::random(two_by_two(), 3, RandomSeed::Fixed(1)).unwrap();
        let run = strategy
            .run(
                &inputs,
                &mut PluginManager::new(),
                &RunContext::new(false),
                &RunControl::new().with_time_limit(std::time::Duration::ZERO),
            )
            .unwrap();
        assert_eq!(run.stop_reason, StopReason::BudgetExhausted);
        assert!(run.trials.is_empty());
    }

    #[test]
    fn sequential_without_optimizer_fails_before_fitting() {
        let strategy =
            SearchStrategy::new(StrategyKind::SequentialModelBased, two_by_two(), 3).unwrap();
        let model = Quadratic::new();
        let err = run_plain(&strategy, &model, &Peak { poison: None }).unwrap_err();
        assert!(matches!(err, HsError::MissingDependency { .. }));
        assert_eq!(model.fit_count(), 0);
    }

    #[test]
    fn sequential_runs_n_trials_with_session_ids() {
        let optimizer = Arc::new(ExploreExploitOptimizer::new(0.3, RandomSeed::Fixed(2)));
        let strategy = SearchStrategy::sequential(two_by_two(), 6, optimizer)
            .unwrap()
            .with_workers(8);
        let run = run_plain(&strategy, &Quadratic::new(), &Peak { poison: None }).unwrap();

        let ids: Vec<u64> = run.trials.iter().map(TrialResult::trial_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    struct Stuttering;

    struct StutterSession;

    impl OptimizerSession for StutterSession {
        fn suggest(&mut self) -> HsResult<Suggestion> {
            Ok(Suggestion {
                trial_number: 5,
                params: ParamMap::from([("a".to_string(), ParamValue::Int(1))]),
            })
        }

        fn report(&mut self, _trial_number: u64, _score: f64) -> HsResult<()> {
            Ok(())
        }
    }

    impl SequentialOptimizer for Stuttering {
        fn name(&self) -> &str {
            "stuttering"
        }

        fn create_session(
            &self,
            _direction: Direction,
            _space: &SearchSpace,
        ) -> HsResult<Box<dyn OptimizerSession>> {
            Ok(Box::new(StutterSession))
        }
    }

    #[test]
    fn duplicate_session_ids_are_rejected() {
        let strategy = SearchStrategy::sequential(two_by_two(), 3, Arc::new(Stuttering)).unwrap();
        let model = Quadratic::new();
        let err = run_plain(&strategy, &model, &Peak { poison: None }).unwrap_err();
        assert!(err.to_string().contains("invalid trial number 5"));
        assert_eq!(model.fit_count(), 1);
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Feedback {
        Scored(u64, f64),
        Failed(u64),
    }

    /// Replays a fixed list of `(a, b)` suggestions and records what it is told.
    struct Scripted {
        plan: Vec<(i64, i64)>,
        feedback: Arc<Mutex<Vec<Feedback>>>,
    }

    struct ScriptedSession {
        plan: std::vec::IntoIter<(i64, i64)>,
        next_id: u64,
        feedback: Arc<Mutex<Vec<Feedback>>>,
    }

    impl OptimizerSession for ScriptedSession {
        fn suggest(&mut self) -> HsResult<Suggestion> {
            let (a, b) = self
                .plan
                .next()
                .ok_or_else(|| HsError::Configuration("script exhausted".into()))?;
            self.next_id += 1;
            Ok(Suggestion {
                trial_number: self.next_id,
                params: ParamMap::from([
                    ("a".to_string(), ParamValue::Int(a)),
                    ("b".to_string(), ParamValue::Int(b)),
                ]),
            })
        }

        fn report(&mut self, trial_number: u64, score: f64) -> HsResult<()> {
            self.feedback.lock().push(Feedback::Scored(trial_number, score));
            Ok(())
        }

        fn report_failure(&mut self, trial_number: u64) -> HsResult<()> {
            self.feedback.lock().push(Feedback::Failed(trial_number));
            Ok(())
        }
    }

    impl SequentialOptimizer for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn create_session(
            &self,
            _direction: Direction,
            _space: &SearchSpace,
        ) -> HsResult<Box<dyn OptimizerSession>> {
            Ok(Box::new(ScriptedSession {
                plan: self.plan.clone().into_iter(),
                next_id: 0,
                feedback: self.feedback.clone(),
            }))
        }
    }

    #[test]
    fn skipped_sequential_trial_is_reported_as_failure() {
        let feedback = Arc::new(Mutex::new(Vec::new()));
        let optimizer = Scripted {
            plan: vec![(1, 20), (2, 20), (2, 10)],
            feedback: feedback.clone(),
        };
        let strategy = SearchStrategy::sequential(two_by_two(), 3, Arc::new(optimizer))
            .unwrap()
            .with_failure_policy(FailurePolicy::Skip);

        let run = run_plain(&strategy, &Quadratic::new(), &Peak { poison: Some(1) }).unwrap();

        assert_eq!(pairs(&run), vec![(2, 20), (2, 10)]);
        assert_eq!(
            run.failed.iter().map(|f| f.trial_id).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(
            *feedback.lock(),
            vec![
                Feedback::Failed(1),
                Feedback::Scored(2, 0.0),
                Feedback::Scored(3, -100.0),
            ]
        );
    }

    #[test]
    fn trial_records_reach_sinks() {
        let (tx, rx) = unbounded();
        let ctx = RunContext::new(true).with_sink(ChannelSink::new(tx));
        let model = Quadratic::new();
        let eval = Peak { poison: None };
        let inputs = TrialInputs::new(&model, &X[..], &X[..], &eval);

        SearchStrategy::grid(two_by_two())
            .with_name("grid")
            .run(&inputs, &mut PluginManager::new(), &ctx, &RunControl::new())
            .unwrap();

        let records: Vec<_> = rx.try_iter().collect();
        // One progress message plus one trial record per trial.
        assert_eq!(records.len(), 8);
        match &records[0] {
            crate::context::SinkRecord::Message { message, .. } => {
                assert!(message.starts_with("Grid trial 1: params=a=1, b=10"));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn params_format_in_key_order() {
        let params = ParamMap::from([
            ("lr".to_string(), ParamValue::Float(0.5)),
            ("depth".to_string(), ParamValue::Int(3)),
            ("loss".to_string(), ParamValue::Text("huber".into())),
        ]);
        assert_eq!(format_params(&params), "depth=3, loss=huber, lr=0.5");
        assert_eq!(format_params(&ParamMap::new()), "");
    }

    #[test]
    fn strategy_kind_parsing() {
        assert_eq!("grid".parse::<StrategyKind>().unwrap(), StrategyKind::Grid);
        assert_eq!("Random".parse::<StrategyKind>().unwrap(), StrategyKind::Random);
        assert_eq!(
            "optuna".parse::<StrategyKind>().unwrap(),
            StrategyKind::SequentialModelBased
        );
        let err = SearchStrategy::from_name("annealing", two_by_two(), 3).unwrap_err();
        assert!(matches!(err, HsError::Configuration(_)));
    }

    #[test]
    fn sampled_search_needs_trials() {
        assert!(SearchStrategy::random(two_by_two(), 0, RandomSeed::Fixed(0)).is_err());
        assert!(SearchStrategy::new(StrategyKind::Grid, two_by_two(), 0).is_ok());
    }
}
