//! The boundary between the search engine and the model being tuned.
//!
//! The engine never inspects a model's internals. It only asks a
//! [`Trainable`] to produce a reconfigured copy of itself, to fit, and to
//! describe itself; scoring is delegated to an [`Evaluator`].

use serde::{Deserialize, Serialize};

use crate::errors::HsResult;
use crate::trial::ParamMap;

/// Static facts about a model, consulted before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model family name (e.g. "XGBClassifier").
    pub name: String,
    /// Whether the model itself declares that it can execute on a GPU.
    pub declares_gpu: bool,
}

impl ModelDescriptor {
    pub fn cpu(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declares_gpu: false,
        }
    }

    pub fn gpu(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declares_gpu: true,
        }
    }
}

/// A model whose hyperparameters can be searched over.
///
/// Implementations must treat `self` as a read-only template in
/// [`Trainable::clone_with`]: every trial starts from a fresh copy so the
/// base configuration is never mutated during a run.
pub trait Trainable: Send + Sync + Sized {
    /// Feature container passed to `fit`.
    type Input: ?Sized + Sync;
    /// Target container passed to `fit`.
    type Target: ?Sized + Sync;

    fn descriptor(&self) -> ModelDescriptor;

    /// Full current configuration.
    fn params(&self) -> ParamMap;

    /// New unfitted instance with the current configuration merged with
    /// `overrides`; overrides win on key conflicts.
    fn clone_with(&self, overrides: &ParamMap) -> HsResult<Self>;

    fn fit(&mut self, x: &Self::Input, y: &Self::Target) -> HsResult<()>;
}

/// Scores a fitted model. Higher is better.
pub trait Evaluator<M: Trainable>: Send + Sync {
    fn name(&self) -> &str {
        "evaluator"
    }

    fn evaluate(&self, model: &M, x: &M::Input, y: &M::Target) -> HsResult<f64>;
}

/// Models that know how to score themselves.
pub trait Scorer: Trainable {
    fn score(&self, x: &Self::Input, y: &Self::Target) -> HsResult<f64>;
}

/// Evaluator that defers to the model's own [`Scorer::score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelScore;

impl<M: Scorer> Evaluator<M> for ModelScore {
    fn name(&self) -> &str {
        "model_score"
    }

    fn evaluate(&self, model: &M, x: &M::Input, y: &M::Target) -> HsResult<f64> {
        model.score(x, y)
    }
}
