//! Experiment tracking backends.
//!
//! A tracker sees one run: `start` with the run configuration, one `log`
//! per completed trial in emission order, then `finish`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hs_types::{HsError, HsResult, MetricMap};

/// Default output file for the `jsonl` backend.
pub const DEFAULT_TRACKING_PATH: &str = "hypersweep_trials.jsonl";

/// Receives per-trial metrics for a run.
pub trait Tracker: Send {
    fn name(&self) -> &str;

    fn start(&mut self, config: &serde_json::Value) -> HsResult<()>;

    fn log(&mut self, trial_id: u64, metrics: &MetricMap) -> HsResult<()>;

    fn finish(&mut self) -> HsResult<()>;
}

/// One tracked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    Start {
        at: DateTime<Utc>,
        config: serde_json::Value,
    },
    Trial {
        at: DateTime<Utc>,
        trial_id: u64,
        metrics: MetricMap,
    },
    Finish {
        at: DateTime<Utc>,
    },
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonLinesTracker {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, event: &TrackerEvent) -> HsResult<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| hs_types::internal_error!("tracker writer missing"))?;
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl Tracker for JsonLinesTracker {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn start(&mut self, config: &serde_json::Value) -> HsResult<()> {
        debug!(path = %self.path.display(), "tracking to json lines");
        self.write(&TrackerEvent::Start {
            at: Utc::now(),
            config: config.clone(),
        })
    }

    fn log(&mut self, trial_id: u64, metrics: &MetricMap) -> HsResult<()> {
        self.write(&TrackerEvent::Trial {
            at: Utc::now(),
            trial_id,
            metrics: metrics.clone(),
        })
    }

    fn finish(&mut self) -> HsResult<()> {
        self.write(&TrackerEvent::Finish { at: Utc::now() })?;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Keeps events in memory. Clones share the same event log, so a caller can
/// keep a handle after giving the tracker to an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    events: Arc<Mutex<Vec<TrackerEvent>>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TrackerEvent> {
        self.events.lock().clone()
    }

    /// Trial ids in the order they were logged.
    pub fn logged_trials(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TrackerEvent::Trial { trial_id, .. } => Some(*trial_id),
                _ => None,
            })
            .collect()
    }
}

impl Tracker for MemoryTracker {
    fn name(&self) -> &str {
        "memory"
    }

    fn start(&mut self, config: &serde_json::Value) -> HsResult<()> {
        self.events.lock().push(TrackerEvent::Start {
            at: Utc::now(),
            config: config.clone(),
        });
        Ok(())
    }

    fn log(&mut self, trial_id: u64, metrics: &MetricMap) -> HsResult<()> {
        self.events.lock().push(TrackerEvent::Trial {
            at: Utc::now(),
            trial_id,
            metrics: metrics.clone(),
        });
        Ok(())
    }

    fn finish(&mut self) -> HsResult<()> {
        self.events.lock().push(TrackerEvent::Finish { at: Utc::now() });
        Ok(())
    }
}

/// Resolve a tracking backend by name.
pub fn tracker_for_backend(backend: &str, path: Option<&Path>) -> HsResult<Box<dyn Tracker>> {
    match backend.to_ascii_lowercase().as_str() {
        "jsonl" | "json" | "file" => Ok(Box::new(JsonLinesTracker::new(
            path.map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKING_PATH)),
        ))),
        "memory" => Ok(Box::new(MemoryTracker::new())),
        _ => Err(HsError::MissingDependency {
            name: format!("tracking backend '{backend}'"),
        }),
    }
}
