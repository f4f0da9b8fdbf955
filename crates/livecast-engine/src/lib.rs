//! Broadcast session controller.
//!
//! Owns the single broadcast session, drives it through
//! `Idle → Connecting → Broadcasting → Stopping → Idle`, and runs the
//! publish handshake off the caller's thread.

mod command_loop;
mod controller;
mod error;
mod probe;
mod session;

pub use command_loop::run_command_loop;
pub use controller::{BroadcastController, ControllerOptions};
pub use error::SessionError;
pub use probe::{CapabilityProbe, PlatformProbe, StaticProbe};

/// Result type for controller operations.
pub type SessionResult<T> = Result<T, SessionError>;
