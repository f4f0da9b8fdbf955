//! Events sent from the controller to the host.

use serde::{Deserialize, Serialize};

use crate::state::{BroadcastState, BroadcastStatus};

/// Events that the controller can send to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<BroadcastState>,

        /// Current state.
        current: Box<BroadcastState>,

        /// Start attempt the transition belongs to.
        generation: u64,
    },

    /// Status snapshot, in answer to `GetStatus`.
    Status(BroadcastStatus),

    /// A command was refused or an attempt failed.
    Error {
        /// Error message.
        message: String,
    },

    /// Command loop is ready.
    Ready,

    /// Command loop has shut down.
    Shutdown,
}
