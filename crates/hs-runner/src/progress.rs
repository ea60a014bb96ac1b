//! Terminal progress display.
//!
//! Redraws one line per completed trial: a bar against the planned trial
//! count, the best score so far and an ETA from the mean trial duration.
//! Searches with no fixed trial count show a running count instead.

use std::io::{self, Write};
use std::time::Instant;

use hs_search::{Plugin, PluginError, PluginResult};
use hs_types::{MetricMap, SCORE_KEY};

const BAR_WIDTH: usize = 24;

/// Render seconds as "42s", "3m 05s" or "2h 10m".
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.0}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let s = (secs % 60.0).floor();
        format!("{mins}m {s:02.0}s")
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{hours}h {mins:02.0}m")
    }
}

pub struct ProgressReporter {
    total: Option<usize>,
    done: usize,
    best: Option<f64>,
    started: Option<Instant>,
    out: Box<dyn Write + Send>,
}

impl ProgressReporter {
    /// Progress on stderr for a run of `total` trials.
    pub fn new(total: Option<usize>) -> Self {
        Self::with_writer(total, io::stderr())
    }

    pub fn with_writer(total: Option<usize>, out: impl Write + Send + 'static) -> Self {
        Self {
            total,
            done: 0,
            best: None,
            started: None,
            out: Box::new(out),
        }
    }

    pub fn completed(&self) -> usize {
        self.done
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// The current progress line, without cursor control.
    pub fn render(&self) -> String {
        let best = match self.best {
            Some(score) => format!("best {score:.4}"),
            None => "best -".to_string(),
        };
        let Some(total) = self.total else {
            return format!("trial {} | {best}", self.done);
        };

        let fraction = if total == 0 {
            1.0
        } else {
            (self.done as f64 / total as f64).min(1.0)
        };
        let filled = (fraction * BAR_WIDTH as f64).round() as usize;
        let bar: String = std::iter::repeat('█')
            .take(filled)
            .chain(std::iter::repeat('░').take(BAR_WIDTH - filled))
            .collect();

        let remaining = total.saturating_sub(self.done);
        let eta = if self.done == 0 {
            "-".to_string()
        } else {
            format_duration(self.elapsed_secs() / self.done as f64 * remaining as f64)
        };
        format!(
            "[{bar}] {:>5.1}% {}/{total} | {best} | ETA {eta}",
            fraction * 100.0,
            self.done
        )
    }

    fn draw(&mut self, terminator: &str) -> PluginResult {
        let line = self.render();
        write!(self.out, "\r{line}{terminator}")
            .and_then(|()| self.out.flush())
            .map_err(|e| PluginError::HookFailed {
                message: format!("progress output failed: {e}"),
            })
    }
}

impl Plugin for ProgressReporter {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_training_start(&mut self) -> PluginResult {
        self.done = 0;
        self.best = None;
        self.started = Some(Instant::now());
        self.draw("")
    }

    fn on_epoch_end(&mut self, metrics: &MetricMap) -> PluginResult {
        self.done += 1;
        if let Some(&score) = metrics.get(SCORE_KEY) {
            if self.best.map_or(true, |best| score > best) {
                self.best = Some(score);
            }
        }
        self.draw("")
    }

    fn on_training_end(&mut self) -> PluginResult {
        let elapsed = format_duration(self.elapsed_secs());
        self.draw(&format!(" | done in {elapsed}\n"))
    }
}
