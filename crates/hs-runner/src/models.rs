//! Reference model and synthetic data used by the quickstart binary and
//! the end-to-end tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use hs_types::{
    config_error, HsError, HsResult, ModelDescriptor, ParamMap, ParamValue, Scorer, Trainable,
};

/// Linear regression fitted by full-batch gradient descent with optional
/// L2 shrinkage.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSgd {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    weights: Vec<f64>,
    bias: f64,
}

impl Default for LinearSgd {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            epochs: 100,
            l2: 0.0,
            weights: Vec::new(),
            bias: 0.0,
        }
    }
}

impl LinearSgd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        self.bias + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>()
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    fn apply(&mut self, name: &str, value: &ParamValue) -> HsResult<()> {
        match name {
            "learning_rate" => {
                let lr = value
                    .as_f64()
                    .filter(|lr| lr.is_finite() && *lr > 0.0)
                    .ok_or_else(|| config_error!("learning_rate must be a positive number, got {value}"))?;
                self.learning_rate = lr;
            }
            "epochs" => {
                let epochs = value
                    .as_i64()
                    .filter(|e| *e > 0)
                    .ok_or_else(|| config_error!("epochs must be a positive integer, got {value}"))?;
                self.epochs = epochs as usize;
            }
            "l2" => {
                let l2 = value
                    .as_f64()
                    .filter(|l2| l2.is_finite() && *l2 >= 0.0)
                    .ok_or_else(|| config_error!("l2 must be non-negative, got {value}"))?;
                self.l2 = l2;
            }
            other => return Err(config_error!("LinearSgd has no parameter {other:?}")),
        }
        Ok(())
    }
}

impl Trainable for LinearSgd {
    type Input = [Vec<f64>];
    type Target = [f64];

    fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor::cpu("LinearSgd")
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("learning_rate".into(), ParamValue::Float(self.learning_rate));
        params.insert("epochs".into(), ParamValue::Int(self.epochs as i64));
        params.insert("l2".into(), ParamValue::Float(self.l2));
        params
    }

    fn clone_with(&self, overrides: &ParamMap) -> HsResult<Self> {
        let mut model = Self {
            learning_rate: self.learning_rate,
            epochs: self.epochs,
            l2: self.l2,
            weights: Vec::new(),
            bias: 0.0,
        };
        for (name, value) in overrides {
            model.apply(name, value)?;
        }
        Ok(model)
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> HsResult<()> {
        let n_features = check_shape(x, y)?;
        let n = x.len() as f64;
        self.weights = vec![0.0; n_features];
        self.bias = 0.0;

        let mut grad = vec![0.0; n_features];
        for _ in 0..self.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;
            for (row, target) in x.iter().zip(y) {
                let err = self.predict_one(row) - target;
                for (g, xi) in grad.iter_mut().zip(row) {
                    *g += err * xi;
                }
                grad_bias += err;
            }
            for (w, g) in self.weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_bias / n;
        }

        if self.weights.iter().chain(std::iter::once(&self.bias)).any(|v| !v.is_finite()) {
            return Err(HsError::Internal(format!(
                "gradient descent diverged (learning_rate={})",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

impl Scorer for LinearSgd {
    /// Coefficient of determination (R²).
    fn score(&self, x: &[Vec<f64>], y: &[f64]) -> HsResult<f64> {
        check_shape(x, y)?;
        if !self.is_fitted() {
            return Err(HsError::Internal("model is not fitted".to_string()));
        }
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let (ss_res, ss_tot) = x.iter().zip(y).fold((0.0, 0.0), |(res, tot), (row, t)| {
            let e = t - self.predict_one(row);
            (res + e * e, tot + (t - mean) * (t - mean))
        });
        if ss_tot == 0.0 {
            return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
        }
        Ok(1.0 - ss_res / ss_tot)
    }
}

fn check_shape(x: &[Vec<f64>], y: &[f64]) -> HsResult<usize> {
    if x.is_empty() {
        return Err(config_error!("training data is empty"));
    }
    if x.len() != y.len() {
        return Err(config_error!(
            "feature rows ({}) and targets ({}) differ in length",
            x.len(),
            y.len()
        ));
    }
    let n_features = x[0].len();
    if x.iter().any(|row| row.len() != n_features) {
        return Err(config_error!("feature rows have inconsistent widths"));
    }
    Ok(n_features)
}

/// Feature rows with their targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    /// Coefficients used to generate `y`, for synthetic data.
    pub true_weights: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Noisy linear data: `y = 1.5 + w·x + noise` with three features in
/// `[-1, 1]`. Deterministic for a given seed.
pub fn synthetic_regression(n_samples: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let true_weights = vec![2.0, -3.0, 0.5];
    let mut x = Vec::with_capacity(n_samples);
    let mut y = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..true_weights.len()).map(|_| rng.gen_range(-1.0..=1.0)).collect();
        let noise: f64 = rng.gen_range(-0.1..=0.1);
        let target = 1.5 + row.iter().zip(&true_weights).map(|(a, w)| a * w).sum::<f64>() + noise;
        x.push(row);
        y.push(target);
    }
    Dataset { x, y, true_weights }
}
