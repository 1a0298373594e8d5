//! Error taxonomy for the outlier engine
//!
//! All variants describe input-shape problems. They are raised where they are
//! detected and surfaced unmodified; the engine never retries.

use thiserror::Error;

/// Errors raised by the detection and explanation engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid distance metric: {0}")]
    InvalidMetric(String),

    #[error("Insufficient data: k={k} neighbors need more than {k} experiments, got {available}")]
    InsufficientData { k: usize, available: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = EngineError::InsufficientData { k: 5, available: 4 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: k=5 neighbors need more than 5 experiments, got 4"
        );
    }

    #[test]
    fn test_invalid_metric_message() {
        let err = EngineError::InvalidMetric("hamming".to_string());
        assert!(err.to_string().contains("hamming"));
    }
}
