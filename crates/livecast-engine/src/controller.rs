//! The broadcast session controller.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, instrument, warn};

use livecast_ipc::{
    BroadcastState, BroadcastStatus, ConflictPolicy, ConnectionParameters, SessionEvent,
    Signature, StopReason, StreamQuality,
};
use livecast_transport::{
    Established, PublishRequest, PublishSession, Publisher, TransportResult,
};

use crate::error::SessionError;
use crate::probe::CapabilityProbe;
use crate::session::BroadcastSession;
use crate::SessionResult;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tuning for a [`BroadcastController`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// What `start` does while a session is active.
    pub conflict_policy: ConflictPolicy,

    /// Preset advertised to the streaming backend.
    pub quality: StreamQuality,

    /// Worker threads of the handshake runtime.
    pub worker_threads: usize,

    /// Where state transitions are reported, if anywhere.
    pub events: Option<Sender<SessionEvent>>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            quality: StreamQuality::default(),
            worker_threads: 2,
            events: None,
        }
    }
}

struct Shared<P: Publisher> {
    publisher: P,
    probe: Box<dyn CapabilityProbe>,
    session: Mutex<BroadcastSession<P::Session>>,
    events: Option<Sender<SessionEvent>>,
    conflict_policy: ConflictPolicy,
    quality: StreamQuality,
}

/// Owns the one broadcast session of the process.
///
/// Every method returns without waiting on the network. The publish handshake
/// and link teardown run on a runtime owned by the controller, so the
/// controller must not be dropped from inside an async context.
pub struct BroadcastController<P: Publisher> {
    shared: Arc<Shared<P>>,
    runtime: Option<Runtime>,
}

impl<P: Publisher> BroadcastController<P> {
    /// Create a controller publishing through `publisher`.
    pub fn new(
        publisher: P,
        probe: impl CapabilityProbe + 'static,
        options: ControllerOptions,
    ) -> SessionResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(options.worker_threads.max(1))
            .thread_name("livecast-session")
            .enable_all()
            .build()?;

        Ok(Self {
            shared: Arc::new(Shared {
                publisher,
                probe: Box::new(probe),
                session: Mutex::new(BroadcastSession::new()),
                events: options.events,
                conflict_policy: options.conflict_policy,
                quality: options.quality,
            }),
            runtime: Some(runtime),
        })
    }

    /// Whether broadcasting works on this platform.
    pub fn is_supported(&self) -> bool {
        self.shared.probe.broadcast_supported()
    }

    /// Whether the signing primitive works on this platform.
    pub fn signing_supported(&self) -> bool {
        self.shared.probe.signing_supported()
    }

    /// Start broadcasting to `connection`.
    ///
    /// Moves the session to `Connecting` before returning and runs the
    /// handshake in the background; its outcome shows up in [`status`].
    /// Returns the generation of the new attempt.
    ///
    /// [`status`]: Self::status
    #[instrument(skip_all, fields(target = %connection.target()))]
    pub fn start(&self, connection: ConnectionParameters, signature: Signature) -> SessionResult<u64> {
        if !self.shared.probe.broadcast_supported() {
            warn!("Broadcasting is not supported on this platform");
            let err = SessionError::UnsupportedPlatform;
            self.shared.reject(&err);
            return Err(err);
        }
        if let Err(e) = connection.validate() {
            let err = SessionError::from(e);
            self.shared.reject(&err);
            return Err(err);
        }
        let runtime = self.runtime()?;

        let (generation, replaced) = {
            let mut session = self.shared.session.lock();
            let mut replaced = None;
            if session.state().is_active() {
                match self.shared.conflict_policy {
                    ConflictPolicy::Reject => {
                        let state = session.state().name();
                        debug!(state, "Session already active, rejecting start");
                        return Err(SessionError::SessionConflict { state });
                    }
                    ConflictPolicy::Restart => {
                        replaced = self.shared.wind_down(&mut session, StopReason::Restart);
                    }
                }
            }
            let generation = session.begin(connection.clone());
            self.shared.transition(&mut session, BroadcastState::Connecting);
            (generation, replaced)
        };

        if let Some(link) = replaced {
            runtime.spawn(link.close());
        }

        info!(generation, "Starting broadcast");
        let request = PublishRequest {
            connection,
            signature,
            quality: self.shared.quality,
            generation,
        };
        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            let handshake = shared.publisher.connect(request);
            shared.run_attempt(generation, handshake).await;
        });

        Ok(generation)
    }

    /// Stop the current broadcast. Safe from any state, any number of times.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let link = {
            let mut session = self.shared.session.lock();
            if !session.state().is_active() {
                if session.clear_error() {
                    debug!("Cleared last error");
                } else {
                    debug!("No active session, ignoring stop");
                }
                return;
            }
            self.shared.wind_down(&mut session, StopReason::UserRequested)
        };

        if let Some(link) = link {
            match &self.runtime {
                Some(runtime) => {
                    runtime.spawn(link.close());
                }
                None => drop(link),
            }
        }
    }

    /// Current session snapshot. Never blocks on I/O.
    pub fn status(&self) -> BroadcastStatus {
        self.shared.session.lock().snapshot()
    }

    /// Human-readable status line, as polled by the host.
    pub fn status_text(&self) -> String {
        self.status().text()
    }

    /// Current state.
    pub fn state(&self) -> BroadcastState {
        self.shared.session.lock().state().clone()
    }

    fn runtime(&self) -> SessionResult<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| SessionError::Runtime(io::Error::other("runtime is shut down")))
    }
}

impl<P: Publisher> Shared<P> {
    async fn run_attempt<F>(&self, generation: u64, handshake: F)
    where
        F: Future<Output = TransportResult<Established<P::Session>>>,
    {
        let Established { session: link, link: watch } = match handshake.await {
            Ok(established) => established,
            Err(e) => {
                // Nothing was installed, so there is no link to release.
                let _ = self.fail(generation, BroadcastState::is_connecting, e.to_string());
                return;
            }
        };

        let stale = {
            let mut session = self.session.lock();
            if session.is_current(generation, BroadcastState::is_connecting) {
                session.install_link(link);
                self.transition(&mut session, BroadcastState::Broadcasting);
                None
            } else {
                Some(link)
            }
        };
        if let Some(link) = stale {
            debug!(generation, "Discarding link of a superseded attempt");
            link.close().await;
            return;
        }
        info!(generation, "Broadcast live");

        match watch.await {
            Ok(lost) => {
                if let Some(link) = self.fail(generation, BroadcastState::is_broadcasting, lost.to_string()) {
                    link.close().await;
                }
            }
            Err(_) => debug!(generation, "Link closed"),
        }
    }

    /// Move a current attempt to `Failed` then `Idle`, keeping the reason.
    fn fail(
        &self,
        generation: u64,
        expected: fn(&BroadcastState) -> bool,
        reason: String,
    ) -> Option<P::Session> {
        let mut session = self.session.lock();
        if !session.is_current(generation, expected) {
            debug!(generation, %reason, "Ignoring outcome of a superseded attempt");
            return None;
        }

        error!(generation, %reason, "Broadcast failed");
        let link = session.take_link();
        session.record_error(reason.clone());
        self.transition(&mut session, BroadcastState::Failed { reason });
        self.transition(&mut session, BroadcastState::Idle);
        link
    }

    /// Surface a synchronous start error while idle.
    fn reject(&self, err: &SessionError) {
        let mut session = self.session.lock();
        if !session.state().is_idle() {
            return;
        }
        let reason = err.to_string();
        session.record_error(reason.clone());
        self.transition(&mut session, BroadcastState::Failed { reason });
        self.transition(&mut session, BroadcastState::Idle);
    }

    /// `Stopping` then `Idle`, handing back the link for release.
    fn wind_down(
        &self,
        session: &mut BroadcastSession<P::Session>,
        reason: StopReason,
    ) -> Option<P::Session> {
        info!(reason = %reason.message(), "Stopping broadcast");
        self.transition(session, BroadcastState::Stopping);
        let link = session.take_link();
        session.clear_error();
        self.transition(session, BroadcastState::Idle);
        link
    }

    fn transition(&self, session: &mut BroadcastSession<P::Session>, next: BroadcastState) {
        let previous = session.set_state(next.clone());
        let generation = session.generation();

        debug!(
            previous = %previous.name(),
            current = %next.name(),
            generation,
            "State transition"
        );

        self.send_event(SessionEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(next),
            generation,
        });
    }

    fn send_event(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                warn!("Failed to send event: {}", e);
            }
        }
    }
}

impl<P: Publisher> Drop for BroadcastController<P> {
    fn drop(&mut self) {
        let link = {
            let mut session = self.shared.session.lock();
            if session.state().is_active() {
                self.shared.wind_down(&mut session, StopReason::Shutdown)
            } else {
                session.take_link()
            }
        };

        if let Some(runtime) = self.runtime.take() {
            if let Some(link) = link {
                runtime.block_on(link.close());
            }
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
    }
}
