use thiserror::Error;

/// Main error type for Hypersweep
#[derive(Error, Debug)]
pub enum HsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing dependency: {name} is required but not available")]
    MissingDependency { name: String },

    #[error("Evaluation error: trial {trial_id} produced non-finite score {score}")]
    Evaluation { trial_id: u64, score: f64 },

    #[error("Trial {trial_id} failed: {message}")]
    TrialFailed { trial_id: u64, message: String },

    #[error("No completed trials to select from")]
    NoCompletedTrials,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HsError {
    /// Whether the error belongs to a single trial rather than the run as a whole.
    pub fn is_trial_failure(&self) -> bool {
        matches!(self, Self::Evaluation { .. } | Self::TrialFailed { .. })
    }
}

/// Result type alias for Hypersweep operations
pub type HsResult<T> = Result<T, HsError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HsError::Configuration(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HsError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HsError::Evaluation {
            trial_id: 3,
            score: f64::NAN,
        };
        assert!(error.to_string().contains("trial 3"));
        assert!(error.to_string().contains("NaN"));

        let missing = HsError::MissingDependency {
            name: "sequential optimizer".into(),
        };
        assert!(missing.to_string().contains("sequential optimizer"));
    }

    #[test]
    fn test_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let hs_error: HsError = io.into();
        match hs_error {
            HsError::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_trial_failure_classification() {
        assert!(HsError::Evaluation { trial_id: 1, score: f64::INFINITY }.is_trial_failure());
        assert!(HsError::TrialFailed { trial_id: 1, message: "diverged".into() }.is_trial_failure());
        assert!(!HsError::NoCompletedTrials.is_trial_failure());
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("Unknown search strategy: {}", "annealing");
        assert!(matches!(config_err, HsError::Configuration(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, HsError::Internal(_)));
    }
}
