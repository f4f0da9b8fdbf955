//! Publish handshake seam and RTMP adapter.
//!
//! The session controller drives a [`Publisher`]; this crate defines that
//! seam and ships an RTMP implementation that performs the connect/publish
//! handshake and then holds the link open.

mod auth;
mod connection;
mod error;
mod publisher;
mod rtmp;

pub use connection::HandshakeTimeouts;
pub use error::TransportError;
pub use publisher::{Established, LinkWatch, PublishRequest, PublishSession, Publisher};
pub use rtmp::{RtmpPublisher, RtmpSession};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Default wait for TCP connect and for each server acceptance, in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;
