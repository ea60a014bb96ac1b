//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hs_search::{FailurePolicy, RandomSeed, StrategyKind};
use hs_types::{HsError, HsResult, SearchSpace};

/// Where per-trial metrics are tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Backend name: "jsonl" or "memory".
    pub backend: String,
    /// Output file for file-backed trackers.
    pub path: Option<PathBuf>,
}

/// Top-level configuration for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,

    /// "grid", "random" or "sequential".
    pub strategy: String,

    /// Trials for random and sequential search (ignored by grid).
    pub n_trials: usize,

    pub seed: RandomSeed,

    /// Worker pool size for grid and random search.
    pub workers: usize,

    /// Soft wall-clock budget, e.g. "90s", "10m", "1h".
    pub time_limit: Option<String>,

    pub failure_policy: FailurePolicy,

    /// Sequential optimizer name; only "explore_exploit" ships built in.
    pub optimizer: Option<String>,

    /// Exploration weight for the explore/exploit optimizer.
    pub exploration_weight: f64,

    pub enable_gpu: bool,

    pub tracking: Option<TrackingConfig>,

    /// Dashboard state file, rewritten with every trial record on flush.
    pub dashboard_state: Option<PathBuf>,

    pub verbose: bool,

    /// Draw a progress bar on stderr while trials complete.
    pub show_progress: bool,

    /// Webhook notified with a run summary when training ends.
    pub notify_webhook: Option<String>,

    /// Explicit search space; when absent the model's default space is used.
    pub search_space: Option<SearchSpace>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "hypersweep".to_string(),
            strategy: "random".to_string(),
            n_trials: 10,
            seed: RandomSeed::Fixed(0),
            workers: 1,
            time_limit: None,
            failure_policy: FailurePolicy::Abort,
            optimizer: Some("explore_exploit".to_string()),
            exploration_weight: 0.3,
            enable_gpu: false,
            tracking: None,
            dashboard_state: None,
            verbose: false,
            show_progress: false,
            notify_webhook: None,
            search_space: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> HsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> HsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_seed(mut self, seed: RandomSeed) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn with_time_limit(mut self, limit: &str) -> Self {
        self.time_limit = Some(limit.to_string());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = Some(space);
        self
    }

    pub fn with_tracking(mut self, backend: &str, path: Option<PathBuf>) -> Self {
        self.tracking = Some(TrackingConfig {
            backend: backend.to_string(),
            path,
        });
        self
    }

    pub fn with_dashboard_state(mut self, path: impl Into<PathBuf>) -> Self {
        self.dashboard_state = Some(path.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_notify_webhook(mut self, url: &str) -> Self {
        self.notify_webhook = Some(url.to_string());
        self
    }

    pub fn strategy_kind(&self) -> HsResult<StrategyKind> {
        self.strategy.parse()
    }

    pub fn time_limit_duration(&self) -> HsResult<Option<Duration>> {
        self.time_limit.as_deref().map(parse_time_limit).transpose()
    }

    /// Check the fields that can be checked without a model.
    pub fn validate(&self) -> HsResult<()> {
        let kind = self.strategy_kind()?;
        if kind != StrategyKind::Grid && self.n_trials == 0 {
            return Err(HsError::Configuration(format!(
                "{kind} search needs n_trials > 0"
            )));
        }
        if self.workers == 0 {
            return Err(HsError::Configuration("workers must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.exploration_weight) {
            return Err(HsError::Configuration(format!(
                "exploration_weight must be within [0, 1], got {}",
                self.exploration_weight
            )));
        }
        self.time_limit_duration()?;
        Ok(())
    }
}

/// Parse budgets such as "500ms", "90s", "10m", "2h". A bare number is
/// taken as seconds.
pub fn parse_time_limit(text: &str) -> HsResult<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| HsError::Configuration(format!("invalid time limit: {text:?}")))?;
    let seconds = match unit.trim() {
        "" | "s" | "sec" | "secs" => value,
        "ms" => value / 1000.0,
        "m" | "min" | "mins" => value * 60.0,
        "h" | "hr" | "hrs" => value * 3600.0,
        other => {
            return Err(HsError::Configuration(format!(
                "unknown time unit {other:?} in {text:?}"
            )))
        }
    };
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| HsError::Configuration(format!("invalid time limit {text:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy_kind().unwrap(), StrategyKind::Random);
        assert_eq!(config.time_limit_duration().unwrap(), None);
    }

    #[test]
    fn time_limits() {
        assert_eq!(parse_time_limit("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_time_limit("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_time_limit("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_time_limit("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_time_limit("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_time_limit("ten minutes").is_err());
        assert!(parse_time_limit("5 fortnights").is_err());
    }

    #[test]
    fn oversized_time_limit_is_a_configuration_error() {
        let err = parse_time_limit("100000000000000000000").unwrap_err();
        assert!(matches!(err, HsError::Configuration(_)));

        let config = RunConfig::default().with_time_limit("100000000000000000000h");
        assert!(matches!(config.validate(), Err(HsError::Configuration(_))));
        assert!(RunConfig::from_json_str(r#"{"time_limit": "100000000000000000000"}"#).is_err());
    }

    #[test]
    fn json_config_round_trip() {
        let json = r#"{
            "name": "iris",
            "strategy": "grid",
            "seed": {"fixed": 11},
            "workers": 2,
            "time_limit": "2m",
            "failure_policy": "skip",
            "tracking": {"backend": "jsonl", "path": "trials.jsonl"},
            "search_space": {"parameters": [{"name": "C", "values": [0.1, 1.0]}]}
        }"#;
        let config = RunConfig::from_json_str(json).unwrap();
        assert_eq!(config.name, "iris");
        assert_eq!(config.seed, RandomSeed::Fixed(11));
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.n_trials, 10);
        assert_eq!(
            config.time_limit_duration().unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(config.search_space.as_ref().unwrap().grid_size(), Some(2));
        assert_eq!(config.tracking.as_ref().unwrap().backend, "jsonl");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(RunConfig::from_json_str(r#"{"strategy": "annealing"}"#).is_err());
        assert!(RunConfig::from_json_str(r#"{"workers": 0}"#).is_err());
        assert!(RunConfig::from_json_str(r#"{"n_trials": 0}"#).is_err());
        assert!(RunConfig::from_json_str(r#"{"strategy": "grid", "n_trials": 0}"#).is_ok());
        assert!(RunConfig::from_json_str(r#"{"time_limit": "soon"}"#).is_err());
        assert!(RunConfig::from_json_str(r#"{"search_space": {"parameters": []}}"#).is_err());
    }

    #[test]
    fn builder_methods() {
        let config = RunConfig::default()
            .with_strategy("sequential")
            .with_n_trials(25)
            .with_workers(4)
            .with_time_limit("30s")
            .with_verbose(true)
            .with_progress(true)
            .with_notify_webhook("http://localhost:9000/hook");
        assert_eq!(config.strategy_kind().unwrap(), StrategyKind::SequentialModelBased);
        assert_eq!(config.n_trials, 25);
        assert!(config.show_progress);
        assert_eq!(config.notify_webhook.as_deref(), Some("http://localhost:9000/hook"));
        assert!(config.validate().is_ok());
    }
}
