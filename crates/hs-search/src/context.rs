//! Per-run logging context and the log sinks it fans out to.
//!
//! A [`RunContext`] is created for one search run and passed down
//! explicitly. It carries the run identity, the verbosity switch and the
//! sinks that receive progress messages and trial records.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hs_types::{HsResult, TrialResult};

/// Severity attached to sink messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One entry in the append-only stream delivered to sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SinkRecord {
    Message { level: LogLevel, message: String },
    Trial(TrialResult),
}

/// Destination for run messages and trial records (console, dashboard,
/// channel, ...). A failing sink never aborts a run.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when a run begins, before any record. Sinks that buffer
    /// per-run state clear it here.
    fn begin_run(&self) -> HsResult<()> {
        Ok(())
    }

    fn record(&self, record: &SinkRecord) -> HsResult<()>;

    fn flush(&self) -> HsResult<()> {
        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn begin_run(&self) -> HsResult<()> {
        (**self).begin_run()
    }

    fn record(&self, record: &SinkRecord) -> HsResult<()> {
        (**self).record(record)
    }

    fn flush(&self) -> HsResult<()> {
        (**self).flush()
    }
}

/// Run `f`, turning both errors and panics into a message.
pub(crate) fn isolated<E, F>(f: F) -> Result<(), String>
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<(), E>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("panicked: {detail}"))
        }
    }
}

/// Logging and metrics context for a single run.
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    verbose: bool,
    sinks: Vec<Box<dyn LogSink>>,
}

impl RunContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            verbose,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Send a message to every sink. Without verbosity only errors go out.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.verbose && level < LogLevel::Error {
            return;
        }
        self.dispatch(&SinkRecord::Message {
            level,
            message: message.into(),
        });
    }

    /// Send a completed trial to every sink, regardless of verbosity.
    pub fn trial(&self, result: &TrialResult) {
        self.dispatch(&SinkRecord::Trial(result.clone()));
    }

    /// Announce the start of the run to every sink.
    pub fn begin(&self) {
        for sink in &self.sinks {
            if let Err(e) = isolated(|| sink.begin_run()) {
                warn!(sink = sink.name(), error = %e, "log sink failed to start run");
            }
        }
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            if let Err(e) = isolated(|| sink.flush()) {
                warn!(sink = sink.name(), error = %e, "log sink flush failed");
            }
        }
    }

    fn dispatch(&self, record: &SinkRecord) {
        for sink in &self.sinks {
            if let Err(e) = isolated(|| sink.record(record)) {
                warn!(sink = sink.name(), error = %e, "log sink failed");
            }
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("started_at", &self.started_at)
            .field("verbose", &self.verbose)
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Forwards records to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn record(&self, record: &SinkRecord) -> HsResult<()> {
        match record {
            SinkRecord::Message { level, message } => match level {
                LogLevel::Debug => debug!("{message}"),
                LogLevel::Info => info!("{message}"),
                LogLevel::Warning => warn!("{message}"),
                LogLevel::Error => error!("{message}"),
            },
            SinkRecord::Trial(result) => info!(
                trial_id = result.trial_id(),
                score = result.score(),
                duration = result.duration(),
                params = ?result.params(),
                "trial recorded"
            ),
        }
        Ok(())
    }
}

/// Pushes records onto a channel for an out-of-band consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkRecord>,
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkRecord>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn record(&self, record: &SinkRecord) -> HsResult<()> {
        // Best-effort send; a dropped receiver just loses the record.
        let _ = self.tx.try_send(record.clone());
        Ok(())
    }
}
