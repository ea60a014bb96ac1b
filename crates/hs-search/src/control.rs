//! Cooperative cancellation and soft wall-clock budgets.
//!
//! Both are checked only at trial boundaries; a fit already in flight is
//! always allowed to finish.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag a caller flips to stop a run between trials.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a strategy stopped producing trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Cancelled,
    BudgetExhausted,
}

/// Caller-facing run limits.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancellationToken,
    time_limit: Option<Duration>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// Start the budget clock for one run.
    pub fn start(&self) -> RunClock {
        let started = Instant::now();
        RunClock {
            token: self.token.clone(),
            started,
            // A limit too large to represent is no limit at all.
            deadline: self
                .time_limit
                .and_then(|limit| started.checked_add(limit)),
        }
    }
}

/// Started clock checked before each trial.
#[derive(Debug, Clone)]
pub struct RunClock {
    token: CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
}

impl RunClock {
    /// `Some` when no further trial should start. Cancellation wins over
    /// an exhausted budget.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.token.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::BudgetExhausted),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
