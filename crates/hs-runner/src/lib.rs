//! Search orchestration and the collaborators around it for Hypersweep.
//!
//! Provides:
//! - The [`SearchOrchestrator`]: GPU guard, tracker and sink wiring, stable
//!   best-trial selection and the final refit
//! - Experiment trackers and the dashboard state file
//! - Run configuration with per-model default search spaces
//! - Lifecycle plugins: resource monitor, progress display, webhook notifier
//! - A reference linear model and synthetic data for end-to-end runs

pub mod config;
pub mod dashboard;
pub mod defaults;
pub mod gpu;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod orchestrator;
pub mod progress;
pub mod telemetry;
pub mod tracker;

pub use config::{parse_time_limit, RunConfig, TrackingConfig};
pub use dashboard::{leaderboard, read_state, DashboardStateSink, DEFAULT_STATE_PATH};
pub use defaults::default_search_space;
pub use gpu::{GpuProbe, StaticGpuProbe, SystemGpuProbe};
pub use models::{synthetic_regression, Dataset, LinearSgd};
pub use monitor::{ResourceMonitor, ResourceSnapshot};
pub use notifier::{Notification, WebhookNotifier};
pub use orchestrator::{select_best, OrchestratorBuilder, SearchOrchestrator, SearchOutcome};
pub use progress::ProgressReporter;
pub use telemetry::init_tracing;
pub use tracker::{tracker_for_backend, JsonLinesTracker, MemoryTracker, Tracker, TrackerEvent};
