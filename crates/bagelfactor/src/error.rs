//! Error types for panel handling and factor evaluation.

use thiserror::Error;

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while normalizing a panel or computing metrics.
///
/// Statistical degeneracy (too few observations, zero variance) is never an
/// error; it shows up as a missing value in the output instead.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Table is not keyed by a well-formed (date, asset) pair
    #[error("Invalid panel: {0}")]
    InvalidPanel(String),

    /// Parameter outside its accepted domain
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Two inputs that must be row-aligned are not
    #[error("Shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
    },

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl EvalError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
