use thiserror::Error;

use crate::model::State;
use crate::parameters::BoundsError;

/// Error types for the fedbatch-rs library.
#[derive(Error, Debug)]
pub enum FedBatchError {
    /// A parameter record, fit specification or optimization specification is
    /// malformed or contradictory. Raised before any integration is attempted.
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// The ODE solver could not advance the state.
    #[error("Integration failed at t = {time}: {reason} (state: {state})")]
    IntegrationFailure {
        time: f64,
        state: State,
        reason: String,
    },

    /// The strategy search never produced a trial that satisfied the volume
    /// constraint.
    #[error("No feasible solution found after {evaluations} evaluations: {reason}")]
    NoFeasibleSolution { evaluations: usize, reason: String },

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating the algorithm failed to converge.
    #[error("Algorithm failed to converge: {0}")]
    ConvergenceFailure(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl FedBatchError {
    /// Shorthand for building an [`FedBatchError::InvalidSpec`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        FedBatchError::InvalidSpec(msg.into())
    }
}

/// Result type alias for fedbatch-rs operations.
pub type Result<T> = std::result::Result<T, FedBatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FedBatchError::invalid("lower bound 2 exceeds initial 1 for mu_max");
        assert!(format!("{}", err).contains("lower bound 2 exceeds initial 1"));

        let err = FedBatchError::IntegrationFailure {
            time: 12.5,
            state: State::new(1.0, 0.0, 0.1, 2.0),
            reason: "step size underflow".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("t = 12.5"));
        assert!(msg.contains("step size underflow"));
        assert!(msg.contains("V=2"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FedBatchError = io_err.into();

        match err {
            FedBatchError::IoError(_) => (),
            _ => panic!("Expected IoError variant"),
        }

        let bounds_err = BoundsError::InvalidBounds { min: 2.0, max: 1.0 };
        let err: FedBatchError = bounds_err.into();
        assert!(matches!(err, FedBatchError::Bounds(_)));
    }
}
