//! Error types for the infobar system.

use thiserror::Error;

use crate::types::TimestampNs;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the infobar system.
///
/// Every variant aborts the pass in progress; nothing is skipped or repaired.
#[derive(Error, Debug)]
pub enum Error {
    /// Tick timestamps went backwards.
    #[error("Ticks not sorted at index {index}: prev_ts={prev_ts}, curr_ts={curr_ts}")]
    UnsortedInput {
        index: usize,
        prev_ts: TimestampNs,
        curr_ts: TimestampNs,
    },

    /// Non-finite or non-positive price, or negative / non-finite size.
    #[error("Invalid tick at index {index}: {reason}")]
    InvalidTick { index: usize, reason: String },

    /// A supplied or derived bar threshold that is not strictly positive.
    #[error("Invalid threshold: {threshold} (must be finite and > 0)")]
    InvalidThreshold { threshold: f64 },

    /// Insufficient data for computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create an invalid tick error.
    pub fn invalid_tick(index: usize, reason: impl Into<String>) -> Self {
        Error::InvalidTick {
            index,
            reason: reason.into(),
        }
    }

    /// Check a threshold and wrap it in an error if it can never close a bar sensibly.
    pub fn check_threshold(threshold: f64) -> Result<f64> {
        if threshold.is_finite() && threshold > 0.0 {
            Ok(threshold)
        } else {
            Err(Error::InvalidThreshold { threshold })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_threshold() {
        assert_eq!(Error::check_threshold(2000.0).unwrap(), 2000.0);
        assert!(matches!(
            Error::check_threshold(0.0),
            Err(Error::InvalidThreshold { .. })
        ));
        assert!(matches!(
            Error::check_threshold(-1.0),
            Err(Error::InvalidThreshold { .. })
        ));
        assert!(Error::check_threshold(f64::NAN).is_err());
        assert!(Error::check_threshold(f64::INFINITY).is_err());
    }

    #[test]
    fn test_display() {
        let err = Error::UnsortedInput {
            index: 3,
            prev_ts: 10,
            curr_ts: 5,
        };
        assert_eq!(
            err.to_string(),
            "Ticks not sorted at index 3: prev_ts=10, curr_ts=5"
        );
        assert_eq!(
            Error::invalid_tick(0, "price is NaN").to_string(),
            "Invalid tick at index 0: price is NaN"
        );
    }
}
