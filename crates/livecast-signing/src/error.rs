//! Error types for the signing module.

use thiserror::Error;

/// Errors that can occur while signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// Message, key, or path was empty.
    #[error("Invalid input: {0} cannot be empty")]
    InvalidInput(&'static str),

    /// The MAC could not be keyed.
    #[error("Signing backend error: {0}")]
    Backend(String),
}
