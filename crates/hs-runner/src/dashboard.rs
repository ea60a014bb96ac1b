//! Dashboard state file.
//!
//! The dashboard reads a single JSON array of trial records. The sink
//! buffers the current run's records as trials complete and rewrites the
//! whole file on flush.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use hs_search::{LogSink, SinkRecord};
use hs_types::{HsResult, TrialResult};

pub const DEFAULT_STATE_PATH: &str = "dashboard_state.json";

/// Log sink that maintains the dashboard state file.
#[derive(Debug)]
pub struct DashboardStateSink {
    path: PathBuf,
    trials: Mutex<Vec<TrialResult>>,
}

impl DashboardStateSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trials: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffered(&self) -> usize {
        self.trials.lock().len()
    }
}

impl LogSink for DashboardStateSink {
    fn name(&self) -> &str {
        "dashboard"
    }

    fn begin_run(&self) -> HsResult<()> {
        self.trials.lock().clear();
        Ok(())
    }

    fn record(&self, record: &SinkRecord) -> HsResult<()> {
        if let SinkRecord::Trial(result) = record {
            self.trials.lock().push(result.clone());
        }
        Ok(())
    }

    fn flush(&self) -> HsResult<()> {
        let json = serde_json::to_vec_pretty(&*self.trials.lock())?;
        write_atomically(&self.path, &json)?;
        debug!(path = %self.path.display(), "dashboard state written");
        Ok(())
    }
}

/// Write through a sibling temp file so readers never see a partial array.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

pub fn parse_state(json: &str) -> HsResult<Vec<TrialResult>> {
    Ok(serde_json::from_str(json)?)
}

/// Read the state file; a missing file is an empty state.
pub fn read_state(path: impl AsRef<Path>) -> HsResult<Vec<TrialResult>> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_state(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Trials ordered best first; equal scores keep trial id order.
pub fn leaderboard(trials: &[TrialResult]) -> Vec<&TrialResult> {
    let mut ranked: Vec<&TrialResult> = trials.iter().collect();
    ranked.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.trial_id().cmp(&b.trial_id()))
    });
    ranked
}
