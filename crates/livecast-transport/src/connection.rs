//! Handshake timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_HANDSHAKE_TIMEOUT_MS;

/// Bounds on each handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeTimeouts {
    /// TCP connect plus RTMP handshake.
    pub connect: Duration,

    /// Wait for the server to accept the application connect.
    pub connection_accept: Duration,

    /// Wait for the server to accept the publish request.
    pub publish_accept: Duration,

    /// Wait for the link task to wind down on close.
    pub close: Duration,
}

impl Default for HandshakeTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS))
    }
}

impl HandshakeTimeouts {
    /// Use one bound for connect and both acceptances.
    pub fn uniform(step: Duration) -> Self {
        Self {
            connect: step,
            connection_accept: step,
            publish_accept: step,
            close: Duration::from_secs(2),
        }
    }

    /// Worst case for a full handshake.
    pub fn total(&self) -> Duration {
        self.connect + self.connection_accept + self.publish_accept
    }
}
