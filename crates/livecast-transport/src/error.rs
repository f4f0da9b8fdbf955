//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request parameters cannot address a server.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server refused the application connect.
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    /// The server refused the publish request.
    #[error("Publish rejected: {0}")]
    PublishRejected(String),

    /// A handshake step did not complete in time.
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// Established link dropped.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RTMP protocol error.
    #[error("RTMP protocol error: {0}")]
    Protocol(String),
}
