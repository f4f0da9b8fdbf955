//! Error types for the view module.

use thiserror::Error;

/// Errors that can occur while provisioning a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// Parameters cannot describe a surface.
    #[error("Invalid view parameters: {0}")]
    InvalidParameters(String),

    /// The platform has no camera/playback surfaces.
    #[error("Views not supported on this platform")]
    NotSupported,

    /// The platform refused to create the surface.
    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// Camera or microphone permission missing.
    #[error("Permission denied for {0}")]
    PermissionDenied(&'static str),
}
