//! Candidate generators for the score-independent strategies.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use hs_types::{ParamMap, SearchSpace};

/// Source of randomness for sampled search. Non-determinism is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomSeed {
    Fixed(u64),
    Entropy,
}

impl RandomSeed {
    pub fn rng(self) -> ChaCha8Rng {
        match self {
            Self::Fixed(seed) => ChaCha8Rng::seed_from_u64(seed),
            Self::Entropy => ChaCha8Rng::from_entropy(),
        }
    }
}

impl Default for RandomSeed {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

/// A parameter assignment paired with the id of the trial that will run it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub trial_id: u64,
    pub params: ParamMap,
}

/// Exhaustive enumeration of the Cartesian product.
///
/// Parameters are walked in insertion order with the last one varying
/// fastest. Trial ids run 1..=N in enumeration order.
#[derive(Debug, Clone)]
pub struct GridCandidates<'a> {
    space: &'a SearchSpace,
    cursor: Vec<usize>,
    next_id: u64,
    exhausted: bool,
}

impl<'a> GridCandidates<'a> {
    pub fn new(space: &'a SearchSpace) -> Self {
        Self {
            space,
            cursor: vec![0; space.num_parameters()],
            next_id: 1,
            exhausted: false,
        }
    }

    fn current(&self) -> ParamMap {
        self.space
            .parameters()
            .iter()
            .zip(&self.cursor)
            .map(|(param, &idx)| (param.name.clone(), param.values[idx].clone()))
            .collect()
    }

    /// Odometer increment; returns false once every position has wrapped.
    fn advance(&mut self) -> bool {
        let params = self.space.parameters();
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < params[pos].values.len() {
                return true;
            }
            self.cursor[pos] = 0;
        }
        false
    }
}

impl Iterator for GridCandidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.exhausted {
            return None;
        }

        let candidate = Candidate {
            trial_id: self.next_id,
            params: self.current(),
        };
        self.next_id += 1;
        self.exhausted = !self.advance();
        Some(candidate)
    }
}

/// Independent uniform draws, one value per parameter, with replacement.
#[derive(Debug, Clone)]
pub struct RandomCandidates<'a> {
    space: &'a SearchSpace,
    rng: ChaCha8Rng,
    remaining: usize,
    next_id: u64,
}

impl<'a> RandomCandidates<'a> {
    pub fn new(space: &'a SearchSpace, n_trials: usize, seed: RandomSeed) -> Self {
        Self {
            space,
            rng: seed.rng(),
            remaining: n_trials,
            next_id: 1,
        }
    }
}

/// Pick one value per parameter uniformly at random.
pub(crate) fn sample_uniform<R: Rng>(space: &SearchSpace, rng: &mut R) -> ParamMap {
    space
        .parameters()
        .iter()
        .map(|param| {
            let idx = rng.gen_range(0..param.values.len());
            (param.name.clone(), param.values[idx].clone())
        })
        .collect()
}

impl Iterator for RandomCandidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let candidate = Candidate {
            trial_id: self.next_id,
            params: sample_uniform(self.space, &mut self.rng),
        };
        self.next_id += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
