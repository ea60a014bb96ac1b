//! Resource monitor plugin.
//!
//! Logs elapsed time and peak resident memory at every lifecycle hook and,
//! when given a channel, emits a [`ResourceSnapshot`] for each one.

use std::time::Instant;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::info;

use hs_search::{Plugin, PluginResult};
use hs_types::{MetricMap, SCORE_KEY};

/// Resource usage observed at one hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub hook: String,
    pub elapsed_secs: f64,
    /// Peak resident set size in KiB, where the platform exposes it.
    pub peak_rss_kb: Option<u64>,
    pub trials_seen: usize,
}

pub struct ResourceMonitor {
    started: Option<Instant>,
    trials_seen: usize,
    best_score: Option<f64>,
    snapshot_tx: Option<Sender<ResourceSnapshot>>,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            started: None,
            trials_seen: 0,
            best_score: None,
            snapshot_tx: None,
        }
    }

    pub fn with_channel(mut self, tx: Sender<ResourceSnapshot>) -> Self {
        self.snapshot_tx = Some(tx);
        self
    }

    pub fn trials_seen(&self) -> usize {
        self.trials_seen
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    fn snapshot(&self, hook: &str) -> ResourceSnapshot {
        let snapshot = ResourceSnapshot {
            hook: hook.to_string(),
            elapsed_secs: self
                .started
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0),
            peak_rss_kb: peak_rss_kb(),
            trials_seen: self.trials_seen,
        };
        if let Some(tx) = &self.snapshot_tx {
            let _ = tx.try_send(snapshot.clone());
        }
        snapshot
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ResourceMonitor {
    fn name(&self) -> &str {
        "resource_monitor"
    }

    fn on_training_start(&mut self) -> PluginResult {
        self.started = Some(Instant::now());
        self.trials_seen = 0;
        self.best_score = None;
        let snap = self.snapshot("on_training_start");
        info!(peak_rss_kb = ?snap.peak_rss_kb, "training started");
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &MetricMap) -> PluginResult {
        self.trials_seen += 1;
        if let Some(&score) = metrics.get(SCORE_KEY) {
            if self.best_score.map_or(true, |best| score > best) {
                self.best_score = Some(score);
            }
        }
        let snap = self.snapshot("on_epoch_end");
        info!(
            trials = snap.trials_seen,
            elapsed_secs = snap.elapsed_secs,
            peak_rss_kb = ?snap.peak_rss_kb,
            "trial finished"
        );
        Ok(())
    }

    fn on_training_end(&mut self) -> PluginResult {
        let snap = self.snapshot("on_training_end");
        info!(
            trials = snap.trials_seen,
            best_score = ?self.best_score,
            elapsed_secs = snap.elapsed_secs,
            peak_rss_kb = ?snap.peak_rss_kb,
            "training finished"
        );
        Ok(())
    }
}

/// Peak resident set size of this process in KiB (`VmHWM`).
pub fn peak_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
}
