//! Error types for the session controller.

use thiserror::Error;

use livecast_ipc::ParameterError;

/// Errors reported synchronously by the controller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The capability probe reports no broadcast support.
    #[error("Broadcasting is not supported on this platform")]
    UnsupportedPlatform,

    /// Connection parameters or signature are unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ParameterError),

    /// Another session holds the live slot.
    #[error("Session already active ({state})")]
    SessionConflict { state: &'static str },

    /// The controller runtime could not be created or is gone.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
