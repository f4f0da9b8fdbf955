//! Validation errors for boundary values.

use thiserror::Error;

/// A boundary value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A required field was empty.
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// A field contained characters it cannot carry.
    #[error("{field} is malformed: {reason}")]
    Malformed {
        field: &'static str,
        reason: String,
    },

    /// Port zero is never a valid target.
    #[error("port cannot be 0")]
    InvalidPort,
}
