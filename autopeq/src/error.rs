//! Error types for the autopeq crate.
//!
//! Validation errors are raised at the API boundary and never recovered
//! internally. Infeasible candidates inside the optimizers are not errors:
//! they are scored as `f64::INFINITY` and only steer the search.

use thiserror::Error;

/// Error type for autopeq operations.
#[derive(Debug, Error)]
pub enum AutopeqError {
    /// Frequency axis bounds or point count are invalid.
    #[error("invalid range: start={start}, end={end}, count={count} (need 0 < start < end and count >= 2)")]
    InvalidRange {
        /// Lower bound in Hz.
        start: f64,
        /// Upper bound in Hz.
        end: f64,
        /// Requested number of points.
        count: usize,
    },

    /// Two paired sequences have different lengths.
    #[error("length mismatch: {what} has {left} vs {right} entries")]
    LengthMismatch {
        /// Which pair of sequences disagreed.
        what: &'static str,
        /// Length of the first sequence.
        left: usize,
        /// Length of the second sequence.
        right: usize,
    },

    /// No data points were supplied where at least one is required.
    #[error("empty input: {what}")]
    EmptyInput {
        /// Name of the empty input.
        what: &'static str,
    },

    /// Frequencies of a curve are not strictly increasing.
    #[error("frequencies of {what} are not strictly increasing at index {index}")]
    NotIncreasing {
        /// Name of the offending curve.
        what: &'static str,
        /// First index where `freq[index] <= freq[index - 1]`.
        index: usize,
    },

    /// A configuration value is outside its domain.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the offending value.
        message: String,
    },

    /// The design run was stopped by its cancel flag.
    #[error("design run cancelled")]
    Cancelled,

    /// Failed to load a curve from a file.
    #[error("failed to load curve from '{path}': {message}")]
    CurveLoad {
        /// Path to the curve file.
        path: String,
        /// Error message describing the failure.
        message: String,
    },

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for autopeq operations.
pub type Result<T> = std::result::Result<T, AutopeqError>;

impl AutopeqError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        AutopeqError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error reports caller misuse of the API.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            AutopeqError::InvalidRange { .. }
                | AutopeqError::LengthMismatch { .. }
                | AutopeqError::EmptyInput { .. }
                | AutopeqError::NotIncreasing { .. }
                | AutopeqError::InvalidConfig { .. }
        )
    }

    /// Returns true if this is a file/IO error.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            AutopeqError::CurveLoad { .. } | AutopeqError::Io(_) | AutopeqError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutopeqError::LengthMismatch {
            what: "curve x/y",
            left: 3,
            right: 4,
        };
        assert_eq!(
            err.to_string(),
            "length mismatch: curve x/y has 3 vs 4 entries"
        );
    }

    #[test]
    fn test_classification() {
        let range = AutopeqError::InvalidRange {
            start: 100.0,
            end: 10.0,
            count: 5,
        };
        assert!(range.is_validation_error());
        assert!(!range.is_io_error());

        let load = AutopeqError::CurveLoad {
            path: "x.csv".to_string(),
            message: "no data".to_string(),
        };
        assert!(load.is_io_error());
        assert!(!load.is_validation_error());
        assert!(!AutopeqError::Cancelled.is_validation_error());
    }
}
