//! Commands sent from the host to the controller.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionParameters, Signature};

/// Commands that the host can send to the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Start broadcasting to the given target.
    Start {
        connection: ConnectionParameters,
        signature: Signature,
    },

    /// Stop the current broadcast.
    Stop,

    /// Request a status snapshot.
    GetStatus,

    /// Stop and shut the command loop down.
    Shutdown,
}
