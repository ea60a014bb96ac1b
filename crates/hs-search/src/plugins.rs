//! Lifecycle observers and their dispatcher.
//!
//! Plugins implement only the hooks they care about; every hook has a no-op
//! default. The [`PluginManager`] calls plugins in registration order and
//! contains failures: a hook that errors or panics is logged and skipped,
//! and the remaining plugins still run.

use thiserror::Error;
use tracing::warn;

use hs_types::MetricMap;

use crate::context::isolated;

/// Errors a plugin hook may report.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("hook failed: {message}")]
    HookFailed { message: String },

    #[error("plugin unavailable: {reason}")]
    Unavailable { reason: String },
}

pub type PluginResult = Result<(), PluginError>;

/// A lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hook<'a> {
    TrainingStart,
    /// Fired once per completed trial with that trial's metrics.
    EpochEnd(&'a MetricMap),
    TrainingEnd,
}

impl Hook<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrainingStart => "on_training_start",
            Self::EpochEnd(_) => "on_epoch_end",
            Self::TrainingEnd => "on_training_end",
        }
    }
}

/// Observer notified of run lifecycle events. Hooks must not influence the
/// search outcome.
pub trait Plugin: Send {
    fn name(&self) -> &str {
        "plugin"
    }

    fn on_training_start(&mut self) -> PluginResult {
        Ok(())
    }

    fn on_epoch_end(&mut self, _metrics: &MetricMap) -> PluginResult {
        Ok(())
    }

    fn on_training_end(&mut self) -> PluginResult {
        Ok(())
    }
}

/// A contained hook failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub hook: &'static str,
    pub message: String,
}

/// Outcome of one `trigger` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failures: Vec<PluginFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered plugin registry.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Invoke `hook` on every plugin in registration order.
    pub fn trigger(&mut self, hook: Hook<'_>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for plugin in &mut self.plugins {
            report.invoked += 1;
            let outcome = isolated(|| match hook {
                Hook::TrainingStart => plugin.on_training_start(),
                Hook::EpochEnd(metrics) => plugin.on_epoch_end(metrics),
                Hook::TrainingEnd => plugin.on_training_end(),
            });

            if let Err(message) = outcome {
                warn!(
                    plugin = plugin.name(),
                    hook = hook.name(),
                    error = %message,
                    "plugin hook failed"
                );
                report.failures.push(PluginFailure {
                    plugin: plugin.name().to_string(),
                    hook: hook.name(),
                    message,
                });
            }
        }

        report
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.names())
            .finish()
    }
}
