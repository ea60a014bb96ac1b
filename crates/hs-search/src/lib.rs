//! # hs-search
//!
//! Search strategies, the per-trial execution protocol and lifecycle plugin
//! dispatch for Hypersweep.
//!
//! Provides grid, random and sequential model-based search over a
//! [`hs_types::SearchSpace`], an explicit per-run [`RunContext`] for log
//! sinks, cooperative cancellation, and a bounded worker pool for the
//! strategies whose trials are independent.

mod candidates;
mod context;
mod control;
mod plugins;
mod protocol;
mod sequential;
mod strategy;

pub use candidates::{Candidate, GridCandidates, RandomCandidates, RandomSeed};
pub use context::{ChannelSink, LogLevel, LogSink, RunContext, SinkRecord, TracingSink};
pub use control::{CancellationToken, RunClock, RunControl, StopReason};
pub use plugins::{
    DispatchReport, Hook, Plugin, PluginError, PluginFailure, PluginManager, PluginResult,
};
pub use protocol::{FailedTrial, FailurePolicy, TrialInputs};
pub use sequential::{
    Direction, ExploreExploitOptimizer, OptimizerSession, SequentialOptimizer, Suggestion,
};
pub use strategy::{format_params, SearchStrategy, StrategyKind, StrategyRun};
