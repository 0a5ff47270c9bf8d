//! Pipeline error types
//!
//! Every stage validates its own preconditions and fails with one of these
//! kinds instead of producing silently wrong output.

use crate::api::ApiError;
use crate::models::ModelError;
use thiserror::Error;

/// Run-level error kinds
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Data-source failure, empty or malformed series
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Fewer bars than the longest rolling window or the regime fit requires
    #[error("Insufficient history: need at least {required} observations, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Sequence or classifier fit did not converge, or input was degenerate
    #[error("Model fit failed: {0}")]
    ModelFitFailure(String),

    /// Parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InsufficientSamples { required, got } => {
                PipelineError::InsufficientHistory {
                    required,
                    available: got,
                }
            }
            ModelError::InvalidParameter(msg) => PipelineError::InvalidParameter(msg),
            other => PipelineError::ModelFitFailure(other.to_string()),
        }
    }
}

impl From<ApiError> for PipelineError {
    fn from(err: ApiError) -> Self {
        PipelineError::DataUnavailable(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::DataUnavailable(format!("CSV error: {}", err))
    }
}
