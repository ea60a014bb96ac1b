//! Trial outcome records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{HsError, HsResult};
use crate::space::ParamValue;

/// Parameter assignment for a single trial.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Named metrics recorded for a single trial.
pub type MetricMap = BTreeMap<String, f64>;

/// Metric key every trial must report.
pub const SCORE_KEY: &str = "score";

/// Outcome of one trial. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrialResult")]
pub struct TrialResult {
    trial_id: u64,
    params: ParamMap,
    metrics: MetricMap,
    duration: f64,
}

#[derive(Deserialize)]
struct RawTrialResult {
    trial_id: u64,
    params: ParamMap,
    metrics: MetricMap,
    duration: f64,
}

impl TryFrom<RawTrialResult> for TrialResult {
    type Error = HsError;

    fn try_from(raw: RawTrialResult) -> HsResult<Self> {
        Self::with_metrics(raw.trial_id, raw.params, raw.metrics, raw.duration)
    }
}

impl TrialResult {
    /// Result carrying only the mandatory `score` metric.
    pub fn new(trial_id: u64, params: ParamMap, score: f64, duration: f64) -> HsResult<Self> {
        let mut metrics = MetricMap::new();
        metrics.insert(SCORE_KEY.to_string(), score);
        Self::with_metrics(trial_id, params, metrics, duration)
    }

    pub fn with_metrics(
        trial_id: u64,
        params: ParamMap,
        metrics: MetricMap,
        duration: f64,
    ) -> HsResult<Self> {
        if trial_id == 0 {
            return Err(HsError::Configuration(
                "trial ids start at 1".to_string(),
            ));
        }
        match metrics.get(SCORE_KEY) {
            None => {
                return Err(HsError::Configuration(format!(
                    "trial {trial_id} is missing the {SCORE_KEY} metric"
                )))
            }
            Some(score) if !score.is_finite() => {
                return Err(HsError::Evaluation {
                    trial_id,
                    score: *score,
                })
            }
            Some(_) => {}
        }
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(HsError::Configuration(format!(
                "trial {trial_id} has invalid duration {duration}"
            )));
        }

        Ok(Self {
            trial_id,
            params,
            metrics,
            duration,
        })
    }

    pub fn trial_id(&self) -> u64 {
        self.trial_id
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn metrics(&self) -> &MetricMap {
        &self.metrics
    }

    /// The `score` metric; always present and finite.
    pub fn score(&self) -> f64 {
        self.metrics.get(SCORE_KEY).copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Wall-clock seconds spent in fit + evaluate.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}
