//! Tracing setup for the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "HS_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Install the global fmt subscriber. `HS_LOG` wins over `verbose`.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_picks_default_level() {
        assert_eq!(default_directive(true), "info");
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing(false);
        init_tracing(true);
    }
}
