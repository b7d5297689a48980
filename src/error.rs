//! Error kinds shared across the analysis and scenario engines.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the analysis and scenario engines.
///
/// All variants are raised synchronously at the point of detection.
/// The engines perform no retries and produce no partial results: a
/// method either returns a complete result or one of these errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Unrecognized fitting, decomposition or correlation method name.
    #[error("unknown method: {method}")]
    UnknownMethod { method: String },

    /// Missing scenario, ensemble or parameter.
    #[error("not found: {name}")]
    NotFound { name: String },

    /// Series too short for the chosen fit or correlation.
    #[error("insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Malformed or out-of-range threshold specification.
    #[error("invalid threshold: {spec}")]
    InvalidThreshold { spec: String },

    /// Invalid caller-supplied parameter (member count, range bounds,
    /// weight length, ...).
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },
}

impl AnalysisError {
    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        AnalysisError::NotFound { name: name.into() }
    }

    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            message: message.into(),
        }
    }
}
