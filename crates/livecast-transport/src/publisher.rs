//! The seam between the session controller and the streaming backend.

use std::future::Future;

use tokio::sync::oneshot;

use livecast_ipc::{ConnectionParameters, Signature, StreamQuality};

use crate::error::TransportError;
use crate::TransportResult;

/// Everything a publisher needs for one start attempt.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Target stream.
    pub connection: ConnectionParameters,

    /// Authorization proof for the backend.
    pub signature: Signature,

    /// Capture/encode preset advertised to the server.
    pub quality: StreamQuality,

    /// Start attempt this request belongs to.
    pub generation: u64,
}

/// Resolves once an established link is lost.
///
/// A closed channel (sender dropped) means the session wound down on its own.
pub type LinkWatch = oneshot::Receiver<TransportError>;

/// A publish link that the backend accepted.
pub struct Established<S> {
    /// Handle that owns the link resources.
    pub session: S,

    /// Fires if the link drops.
    pub link: LinkWatch,
}

/// Drives the connect/publish handshake with a streaming backend.
pub trait Publisher: Send + Sync + 'static {
    /// Live link handle.
    type Session: PublishSession;

    /// Run the handshake. Must not borrow `self` past the call.
    fn connect(
        &self,
        request: PublishRequest,
    ) -> impl Future<Output = TransportResult<Established<Self::Session>>> + Send + 'static;
}

/// Owns the resources of an accepted publish link.
pub trait PublishSession: Send + 'static {
    /// Release the link. Called at most once per session.
    fn close(self) -> impl Future<Output = ()> + Send + 'static;
}
