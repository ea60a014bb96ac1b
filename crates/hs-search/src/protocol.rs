//! The per-trial execution protocol shared by every strategy.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use hs_types::{Evaluator, HsError, HsResult, ParamMap, Trainable, TrialResult};

/// What to do when a single trial fails to produce a usable score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Propagate the first trial failure and end the run.
    #[default]
    Abort,
    /// Record the failure, exclude it from selection and carry on.
    Skip,
}

/// A trial that was started but produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTrial {
    pub trial_id: u64,
    pub params: ParamMap,
    pub error: String,
}

/// Borrowed inputs every trial needs.
pub struct TrialInputs<'a, M: Trainable, E: ?Sized> {
    pub model: &'a M,
    pub x: &'a M::Input,
    pub y: &'a M::Target,
    pub evaluator: &'a E,
}

impl<'a, M: Trainable, E: Evaluator<M> + ?Sized> TrialInputs<'a, M, E> {
    pub fn new(model: &'a M, x: &'a M::Input, y: &'a M::Target, evaluator: &'a E) -> Self {
        Self {
            model,
            x,
            y,
            evaluator,
        }
    }

    /// Clone the base model with `params`, fit, evaluate and time the
    /// fit + evaluate block.
    ///
    /// Configuration errors from `clone_with` are returned unchanged; fit and
    /// evaluation failures become trial failures. A non-finite score is an
    /// [`HsError::Evaluation`].
    pub fn execute(&self, trial_id: u64, params: ParamMap) -> HsResult<TrialResult> {
        let mut model = self.model.clone_with(&params)?;

        let start = Instant::now();
        model
            .fit(self.x, self.y)
            .map_err(|e| as_trial_failure(trial_id, "fit", e))?;
        let score = self
            .evaluator
            .evaluate(&model, self.x, self.y)
            .map_err(|e| as_trial_failure(trial_id, "evaluate", e))?;
        let duration = start.elapsed().as_secs_f64();

        if !score.is_finite() {
            return Err(HsError::Evaluation { trial_id, score });
        }

        TrialResult::new(trial_id, params, score, duration)
    }
}

fn as_trial_failure(trial_id: u64, stage: &str, error: HsError) -> HsError {
    if error.is_trial_failure() {
        return error;
    }
    HsError::TrialFailed {
        trial_id,
        message: format!("{stage}: {error}"),
    }
}
