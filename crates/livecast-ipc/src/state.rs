//! Broadcast session state machine types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ConnectionParameters;

/// The lifecycle state of the broadcast session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastState {
    /// No broadcast is running.
    #[default]
    Idle,

    /// Connect/publish handshake in flight.
    Connecting,

    /// The streaming backend accepted the publish.
    Broadcasting,

    /// Resources are being released.
    Stopping,

    /// The attempt failed; the session returns to `Idle` right after.
    Failed {
        /// Error message.
        reason: String,
    },
}

impl BroadcastState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a handshake is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Returns true if the session is live.
    pub fn is_broadcasting(&self) -> bool {
        matches!(self, Self::Broadcasting)
    }

    /// Returns true if the session is stopping.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    /// Returns true if the session is in the failed state.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns true while the session holds the single live slot.
    pub fn is_active(&self) -> bool {
        self.is_connecting() || self.is_broadcasting()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Broadcasting => "Broadcasting",
            Self::Stopping => "Stopping",
            Self::Failed { .. } => "Failed",
        }
    }

    /// Returns the status word used by the mobile SDK bridge.
    pub fn legacy_name(&self) -> &'static str {
        match self {
            Self::Idle | Self::Failed { .. } => "stopped",
            Self::Connecting => "starting",
            Self::Broadcasting => "running",
            Self::Stopping => "stopping",
        }
    }
}

/// Point-in-time view of the session, as returned by `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastStatus {
    /// Current state.
    pub state: BroadcastState,

    /// Parameters the current or last session was started with.
    pub connection: Option<ConnectionParameters>,

    /// Failure detail of the last attempt, cleared by `start` and `stop`.
    pub last_error: Option<String>,

    /// Generation of the most recent start attempt.
    pub generation: u64,
}

impl BroadcastStatus {
    /// Human-readable status line.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.last_error) {
            (BroadcastState::Failed { reason }, _) => write!(f, "Failed: {reason}"),
            (BroadcastState::Idle, Some(error)) => write!(f, "Failed: {error}"),
            (state, _) => f.write_str(state.name()),
        }
    }
}

/// Reason for stopping the broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Host requested stop.
    UserRequested,

    /// A new start replaced the running session.
    Restart,

    /// The controller is being torn down.
    Shutdown,
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Broadcast stopped by user".to_string(),
            Self::Restart => "Broadcast replaced by a new session".to_string(),
            Self::Shutdown => "Controller shutting down".to_string(),
        }
    }
}
