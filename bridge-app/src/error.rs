//! Errors as the host sees them.

use std::fmt;

use serde::{Deserialize, Serialize};

use livecast_engine::SessionError;
use livecast_ipc::ParameterError;
use livecast_signing::SigningError;
use livecast_view::ProvisioningError;

/// Coarse failure category reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedPlatform,
    InvalidInput,
    SessionConflict,
    Provisioning,
    ConnectionFailure,
    Internal,
}

/// Error type for host commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        let kind = match &err {
            SessionError::UnsupportedPlatform => ErrorKind::UnsupportedPlatform,
            SessionError::InvalidInput(_) => ErrorKind::InvalidInput,
            SessionError::SessionConflict { .. } => ErrorKind::SessionConflict,
            SessionError::Runtime(_) => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<SigningError> for CommandError {
    fn from(err: SigningError) -> Self {
        let kind = match &err {
            SigningError::InvalidInput(_) => ErrorKind::InvalidInput,
            SigningError::Backend(_) => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ProvisioningError> for CommandError {
    fn from(err: ProvisioningError) -> Self {
        let kind = match &err {
            ProvisioningError::NotSupported => ErrorKind::UnsupportedPlatform,
            ProvisioningError::InvalidParameters(_) => ErrorKind::InvalidInput,
            ProvisioningError::SurfaceUnavailable(_) | ProvisioningError::PermissionDenied(_) => {
                ErrorKind::Provisioning
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ParameterError> for CommandError {
    fn from(err: ParameterError) -> Self {
        Self::new(ErrorKind::InvalidInput, err.to_string())
    }
}

/// Result type for host commands.
pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = CommandError::from(SessionError::SessionConflict { state: "Broadcasting" });
        assert_eq!(err.kind, ErrorKind::SessionConflict);

        let err = CommandError::from(SigningError::InvalidInput("key"));
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = CommandError::from(ProvisioningError::PermissionDenied("camera"));
        assert_eq!(err.kind, ErrorKind::Provisioning);
    }

    #[test]
    fn test_serializes_for_host() {
        let err = CommandError::new(ErrorKind::UnsupportedPlatform, "nope");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unsupported_platform");
        assert_eq!(json["message"], "nope");
    }
}
