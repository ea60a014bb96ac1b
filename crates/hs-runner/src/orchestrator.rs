//! Search orchestration.
//!
//! [`SearchOrchestrator`] wires a base model, a [`SearchStrategy`], an
//! evaluator and the run's observers together, then picks the best trial
//! and refits it on the full data.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use hs_search::{
    format_params, CancellationToken, ExploreExploitOptimizer, FailedTrial, FailurePolicy, Hook,
    LogLevel,
    LogSink, Plugin, PluginManager, RandomSeed, RunContext, RunControl, SearchStrategy,
    StopReason, StrategyKind, TracingSink, TrialInputs,
};
use hs_types::{
    Evaluator, HsError, HsResult, ModelDescriptor, ParamMap, SearchSpace, Trainable, TrialResult,
};

use crate::config::RunConfig;
use crate::dashboard::DashboardStateSink;
use crate::defaults::default_search_space;
use crate::gpu::{GpuProbe, SystemGpuProbe};
use crate::notifier::WebhookNotifier;
use crate::progress::ProgressReporter;
use crate::tracker::{tracker_for_backend, Tracker};

/// Name of the bundled sequential optimizer.
pub const EXPLORE_EXPLOIT: &str = "explore_exploit";

/// Result of a completed search.
#[derive(Debug)]
pub struct SearchOutcome<M> {
    /// Base model reconfigured with the best params and fitted on all data.
    pub model: M,
    pub best: TrialResult,
    /// Completed trials in emission order.
    pub trials: Vec<TrialResult>,
    pub failed: Vec<FailedTrial>,
    pub stop_reason: StopReason,
    pub run_id: Uuid,
}

impl<M> SearchOutcome<M> {
    pub fn best_params(&self) -> &ParamMap {
        self.best.params()
    }

    pub fn best_score(&self) -> f64 {
        self.best.score()
    }
}

/// Stable argmax over `score`: on ties the earliest trial wins.
pub fn select_best(trials: &[TrialResult]) -> Option<&TrialResult> {
    let mut best: Option<&TrialResult> = None;
    for trial in trials {
        let improves = match best {
            None => true,
            Some(current) => trial.score() > current.score(),
        };
        if improves {
            best = Some(trial);
        }
    }
    best
}

enum TrackerChoice {
    Instance(Box<dyn Tracker>),
    Backend { name: String, path: Option<PathBuf> },
}

/// Configuration handed to the tracker at the start of a run.
#[derive(Serialize)]
struct RunSummary<'a> {
    run_id: Uuid,
    name: &'a str,
    strategy: StrategyKind,
    planned_trials: Option<usize>,
    workers: usize,
    seed: RandomSeed,
    failure_policy: FailurePolicy,
    model: ModelDescriptor,
    base_params: ParamMap,
    search_space: &'a SearchSpace,
}

/// Builder for [`SearchOrchestrator`].
pub struct OrchestratorBuilder<M: Trainable> {
    name: String,
    model: M,
    strategy: SearchStrategy,
    evaluator: Box<dyn Evaluator<M>>,
    plugins: PluginManager,
    tracker: Option<TrackerChoice>,
    sinks: Vec<Arc<dyn LogSink>>,
    enable_gpu: bool,
    gpu_probe: Box<dyn GpuProbe>,
    verbose: bool,
    control: RunControl,
}

impl<M: Trainable + 'static> OrchestratorBuilder<M> {
    pub fn new(model: M, strategy: SearchStrategy, evaluator: impl Evaluator<M> + 'static) -> Self {
        Self {
            name: strategy.name().to_string(),
            model,
            strategy,
            evaluator: Box::new(evaluator),
            plugins: PluginManager::new(),
            tracker: None,
            sinks: Vec::new(),
            enable_gpu: false,
            gpu_probe: Box::new(SystemGpuProbe),
            verbose: false,
            control: RunControl::new(),
        }
    }

    /// Builder populated from a [`RunConfig`]. When the config carries no
    /// search space the default space registered for the model is used.
    pub fn from_config(
        model: M,
        evaluator: impl Evaluator<M> + 'static,
        config: &RunConfig,
    ) -> HsResult<Self> {
        config.validate()?;
        let space = match &config.search_space {
            Some(space) => space.clone(),
            None => default_search_space(&model.descriptor().name)?,
        };

        let kind = config.strategy_kind()?;
        let mut strategy = SearchStrategy::new(kind, space, config.n_trials)?
            .with_seed(config.seed)
            .with_workers(config.workers)
            .with_failure_policy(config.failure_policy);

        if kind == StrategyKind::SequentialModelBased {
            match config.optimizer.as_deref() {
                Some(EXPLORE_EXPLOIT) => {
                    strategy = strategy.with_optimizer(Arc::new(ExploreExploitOptimizer::new(
                        config.exploration_weight,
                        config.seed,
                    )));
                }
                Some(other) => warn!(optimizer = other, "unknown sequential optimizer"),
                None => {}
            }
        }

        let mut control = RunControl::new();
        if let Some(limit) = config.time_limit_duration()? {
            control = control.with_time_limit(limit);
        }

        let mut builder = Self::new(model, strategy, evaluator)
            .name(config.name.clone())
            .enable_gpu(config.enable_gpu)
            .verbose(config.verbose)
            .show_progress(config.show_progress)
            .control(control);
        if let Some(url) = &config.notify_webhook {
            builder = builder.plugin(WebhookNotifier::new(url)?);
        }
        if let Some(tracking) = &config.tracking {
            builder = builder.tracking_backend(&tracking.backend, tracking.path.clone());
        }
        if let Some(path) = &config.dashboard_state {
            builder = builder.dashboard(path.clone());
        }
        Ok(builder)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.register(Box::new(plugin));
        self
    }

    pub fn tracker(mut self, tracker: impl Tracker + 'static) -> Self {
        self.tracker = Some(TrackerChoice::Instance(Box::new(tracker)));
        self
    }

    /// Tracker resolved by name when the search starts.
    pub fn tracking_backend(mut self, backend: &str, path: Option<PathBuf>) -> Self {
        self.tracker = Some(TrackerChoice::Backend {
            name: backend.to_string(),
            path,
        });
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Maintain a dashboard state file at `path`.
    pub fn dashboard(self, path: impl Into<PathBuf>) -> Self {
        self.sink(Arc::new(DashboardStateSink::new(path)))
    }

    pub fn enable_gpu(mut self, enable: bool) -> Self {
        self.enable_gpu = enable;
        self
    }

    pub fn gpu_probe(mut self, probe: impl GpuProbe + 'static) -> Self {
        self.gpu_probe = Box::new(probe);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Draw a progress bar on stderr, sized to the strategy's planned trials.
    pub fn show_progress(self, show: bool) -> Self {
        if !show {
            return self;
        }
        let total = self.strategy.planned_trials();
        self.plugin(ProgressReporter::new(total))
    }

    pub fn control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Validate GPU prerequisites and produce the orchestrator.
    pub fn build(self) -> HsResult<SearchOrchestrator<M>> {
        if self.enable_gpu {
            let descriptor = self.model.descriptor();
            if !self.gpu_probe.is_available() {
                return Err(HsError::Configuration(
                    "GPU requested but none detected".to_string(),
                ));
            }
            if !self.gpu_probe.supports(&descriptor) {
                return Err(HsError::Configuration(format!(
                    "Model {} does not appear to support GPU",
                    descriptor.name
                )));
            }
            info!(model = %descriptor.name, "GPU execution enabled");
        }

        Ok(SearchOrchestrator {
            name: self.name,
            model: self.model,
            strategy: self.strategy,
            evaluator: self.evaluator,
            plugins: self.plugins,
            tracker: self.tracker,
            sinks: self.sinks,
            verbose: self.verbose,
            control: self.control,
        })
    }
}

/// Runs a hyperparameter search and refits the winner.
pub struct SearchOrchestrator<M: Trainable> {
    name: String,
    model: M,
    strategy: SearchStrategy,
    evaluator: Box<dyn Evaluator<M>>,
    plugins: PluginManager,
    tracker: Option<TrackerChoice>,
    sinks: Vec<Arc<dyn LogSink>>,
    verbose: bool,
    control: RunControl,
}

impl<M: Trainable + 'static> SearchOrchestrator<M> {
    pub fn builder(
        model: M,
        strategy: SearchStrategy,
        evaluator: impl Evaluator<M> + 'static,
    ) -> OrchestratorBuilder<M> {
        OrchestratorBuilder::new(model, strategy, evaluator)
    }

    pub fn strategy(&self) -> &SearchStrategy {
        &self.strategy
    }

    pub fn base_model(&self) -> &M {
        &self.model
    }

    /// Handle that stops the run before its next trial.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.token().clone()
    }

    /// Run the search on `(x, y)` and refit the best configuration on the
    /// same data.
    ///
    /// Observers are bracketed even when the strategy fails: the tracker is
    /// finished, `on_training_end` fires and sinks are flushed before the
    /// error is returned.
    pub fn search(&mut self, x: &M::Input, y: &M::Target) -> HsResult<SearchOutcome<M>> {
        let ctx = self.run_context();
        let summary = serde_json::to_value(self.summary(ctx.run_id()))?;
        let mut tracker = self.resolve_tracker()?;
        ctx.begin();
        info!(
            run_id = %ctx.run_id(),
            name = %self.name,
            strategy = %self.strategy.kind(),
            "search run starting"
        );

        if let Some(tracker) = tracker.as_deref_mut() {
            tracker_call(tracker, "start", |t| t.start(&summary));
        }
        self.plugins.trigger(Hook::TrainingStart);

        let inputs = TrialInputs::new(&self.model, x, y, self.evaluator.as_ref());
        let result = self
            .strategy
            .run(&inputs, &mut self.plugins, &ctx, &self.control);

        if let Some(tracker) = tracker.as_deref_mut() {
            if let Ok(run) = &result {
                for trial in &run.trials {
                    tracker_call(tracker, "log", |t| t.log(trial.trial_id(), trial.metrics()));
                }
            }
            tracker_call(tracker, "finish", |t| t.finish());
        }
        self.restore_tracker(tracker);
        self.plugins.trigger(Hook::TrainingEnd);
        ctx.flush();

        let run = result?;
        let best = select_best(&run.trials)
            .cloned()
            .ok_or(HsError::NoCompletedTrials)?;
        ctx.log(
            LogLevel::Info,
            format!(
                "Best trial {} with score {:.4}: {}",
                best.trial_id(),
                best.score(),
                format_params(best.params())
            ),
        );
        info!(trial_id = best.trial_id(), score = best.score(), "refitting best trial");

        let mut model = self.model.clone_with(best.params())?;
        model.fit(x, y)?;

        Ok(SearchOutcome {
            model,
            best,
            trials: run.trials,
            failed: run.failed,
            stop_reason: run.stop_reason,
            run_id: ctx.run_id(),
        })
    }

    fn resolve_tracker(&mut self) -> HsResult<Option<Box<dyn Tracker>>> {
        match self.tracker.take() {
            None => Ok(None),
            Some(TrackerChoice::Backend { name, path }) => {
                let resolved = tracker_for_backend(&name, path.as_deref());
                self.tracker = Some(TrackerChoice::Backend { name, path });
                resolved.map(Some)
            }
            Some(TrackerChoice::Instance(tracker)) => Ok(Some(tracker)),
        }
    }

    /// Put a caller-supplied tracker back for the next run.
    fn restore_tracker(&mut self, tracker: Option<Box<dyn Tracker>>) {
        if self.tracker.is_none() {
            self.tracker = tracker.map(TrackerChoice::Instance);
        }
    }

    fn run_context(&self) -> RunContext {
        let mut ctx = RunContext::new(self.verbose);
        if self.verbose {
            ctx.add_sink(Box::new(TracingSink));
        }
        for sink in &self.sinks {
            ctx.add_sink(Box::new(Arc::clone(sink)));
        }
        ctx
    }

    fn summary(&self, run_id: Uuid) -> RunSummary<'_> {
        RunSummary {
            run_id,
            name: &self.name,
            strategy: self.strategy.kind(),
            planned_trials: self.strategy.planned_trials(),
            workers: self.strategy.workers(),
            seed: self.strategy.seed(),
            failure_policy: self.strategy.failure_policy(),
            model: self.model.descriptor(),
            base_params: self.model.params(),
            search_space: self.strategy.space(),
        }
    }
}

/// Call into a tracker, logging instead of propagating any failure.
fn tracker_call<F>(tracker: &mut dyn Tracker, op: &'static str, f: F)
where
    F: FnOnce(&mut dyn Tracker) -> HsResult<()>,
{
    let name = tracker.name().to_string();
    match catch_unwind(AssertUnwindSafe(|| f(tracker))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(tracker = %name, op, error = %e, "tracker call failed"),
        Err(_) => warn!(tracker = %name, op, "tracker panicked"),
    }
}
