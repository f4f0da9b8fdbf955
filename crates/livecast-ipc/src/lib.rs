//! Typed host<->controller messages for the live broadcast bridge.
//!
//! This crate defines the values that cross the boundary between the host
//! application and the broadcast session controller.

mod commands;
mod error;
mod events;
mod state;
mod types;

pub use commands::SessionCommand;
pub use error::ParameterError;
pub use events::SessionEvent;
pub use state::{BroadcastState, BroadcastStatus, StopReason};
pub use types::{
    CapabilityMode, ConflictPolicy, ConnectionParameters, Signature, StreamQuality,
    DEFAULT_RTMP_PORT,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → controller).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (controller → host).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<SessionCommand>, Receiver<SessionCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
