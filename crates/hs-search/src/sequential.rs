//! Session contract for sequential model-based search.
//!
//! A [`SequentialOptimizer`] hands out one [`OptimizerSession`] per run.
//! The session is strictly sequential: a new suggestion may depend on every
//! score reported before it, so callers must report a trial before asking
//! for the next one.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use hs_types::{HsError, HsResult, ParamMap, SearchSpace};

use crate::candidates::{sample_uniform, RandomSeed};

/// Whether the session should steer towards higher or lower scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    /// Whether `candidate` is strictly better than `incumbent`.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// A proposed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub trial_number: u64,
    pub params: ParamMap,
}

/// Stateful suggest/report loop for one run.
pub trait OptimizerSession: Send {
    fn suggest(&mut self) -> HsResult<Suggestion>;

    fn report(&mut self, trial_number: u64, score: f64) -> HsResult<()>;

    /// Tell the session a suggested trial produced no score.
    fn report_failure(&mut self, _trial_number: u64) -> HsResult<()> {
        Ok(())
    }
}

/// Factory for optimizer sessions.
pub trait SequentialOptimizer: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(
        &self,
        direction: Direction,
        space: &SearchSpace,
    ) -> HsResult<Box<dyn OptimizerSession>>;
}

/// Explore/exploit optimizer over categorical candidates.
///
/// Each suggestion either samples uniformly (with probability
/// `exploration_weight`, and always before the first report) or perturbs
/// the best observation so far by moving each parameter at most one
/// position along its candidate list.
#[derive(Debug, Clone)]
pub struct ExploreExploitOptimizer {
    exploration_weight: f64,
    seed: RandomSeed,
}

impl ExploreExploitOptimizer {
    pub fn new(exploration_weight: f64, seed: RandomSeed) -> Self {
        Self {
            exploration_weight: exploration_weight.clamp(0.0, 1.0),
            seed,
        }
    }
}

impl Default for ExploreExploitOptimizer {
    fn default() -> Self {
        Self::new(0.3, RandomSeed::default())
    }
}

impl SequentialOptimizer for ExploreExploitOptimizer {
    fn name(&self) -> &str {
        "explore_exploit"
    }

    fn create_session(
        &self,
        direction: Direction,
        space: &SearchSpace,
    ) -> HsResult<Box<dyn OptimizerSession>> {
        Ok(Box::new(ExploreExploitSession {
            space: space.clone(),
            direction,
            exploration_weight: self.exploration_weight,
            rng: self.seed.rng(),
            next_number: 1,
            pending: HashMap::new(),
            observations: Vec::new(),
        }))
    }
}

struct ExploreExploitSession {
    space: SearchSpace,
    direction: Direction,
    exploration_weight: f64,
    rng: ChaCha8Rng,
    next_number: u64,
    pending: HashMap<u64, ParamMap>,
    observations: Vec<(ParamMap, f64)>,
}

impl ExploreExploitSession {
    fn best(&self) -> Option<&ParamMap> {
        let mut best: Option<&(ParamMap, f64)> = None;
        for obs in &self.observations {
            match best {
                Some(current) if !self.direction.improves(obs.1, current.1) => {}
                _ => best = Some(obs),
            }
        }
        best.map(|(params, _)| params)
    }

    fn exploit(&mut self, base: &ParamMap) -> ParamMap {
        let mut perturbed = ParamMap::new();
        for param in self.space.parameters() {
            let len = param.values.len() as i64;
            let origin = base
                .get(&param.name)
                .and_then(|v| param.values.iter().position(|c| c == v));
            let idx = match origin {
                Some(pos) => {
                    let delta: i64 = self.rng.gen_range(-1..=1);
                    (pos as i64 + delta).clamp(0, len - 1) as usize
                }
                None => self.rng.gen_range(0..param.values.len()),
            };
            perturbed.insert(param.name.clone(), param.values[idx].clone());
        }
        perturbed
    }
}

impl OptimizerSession for ExploreExploitSession {
    fn suggest(&mut self) -> HsResult<Suggestion> {
        let explore = self.rng.gen::<f64>() < self.exploration_weight;
        let params = match self.best().cloned() {
            Some(base) if !explore => self.exploit(&base),
            _ => sample_uniform(&self.space, &mut self.rng),
        };

        let trial_number = self.next_number;
        self.next_number += 1;
        self.pending.insert(trial_number, params.clone());
        Ok(Suggestion {
            trial_number,
            params,
        })
    }

    fn report(&mut self, trial_number: u64, score: f64) -> HsResult<()> {
        let params = self.pending.remove(&trial_number).ok_or_else(|| {
            HsError::Configuration(format!("trial {trial_number} was never suggested"))
        })?;
        self.observations.push((params, score));
        Ok(())
    }

    fn report_failure(&mut self, trial_number: u64) -> HsResult<()> {
        self.pending.remove(&trial_number);
        Ok(())
    }
}
