//! Host command handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, instrument, warn};

use livecast_engine::run_command_loop;
use livecast_ipc::{
    BroadcastStatus, ConnectionParameters, SessionCommand, SessionEvent, Signature,
};
use livecast_view::ViewHandle;

use crate::error::{CommandError, CommandResult, ErrorKind};
use crate::LivecastBridge;

const FORWARD_POLL: Duration = Duration::from_millis(100);

impl LivecastBridge {
    /// Camera preview. A non-empty `sdk_key` replaces the configured key.
    #[instrument(skip_all)]
    pub fn get_camera_view(&self, sdk_key: &str) -> CommandResult<ViewHandle> {
        Ok(self.views.camera_view(sdk_key)?)
    }

    /// Playback of an ingest stream. Empty `username` means no credentials.
    #[instrument(skip(self, username, password))]
    pub fn get_player_view(
        &self,
        host: &str,
        application: &str,
        port: u16,
        stream_name: &str,
        username: &str,
        password: &str,
    ) -> CommandResult<ViewHandle> {
        let mut connection = ConnectionParameters::new(host, port, application, stream_name);
        if !username.is_empty() {
            connection = connection.with_credentials(username, password);
        }
        Ok(self.views.player_view(connection)?)
    }

    /// Stop playback. A no-op when nothing plays.
    pub fn stop_player(&self) {
        self.views.stop_player();
    }

    /// Give a view back. Returns false if it was already released.
    pub fn release_view(&self, handle: ViewHandle) -> bool {
        self.views.release(handle)
    }

    /// Start broadcasting. The outcome shows up in [`get_broadcast_status`].
    ///
    /// [`get_broadcast_status`]: Self::get_broadcast_status
    pub fn start_broadcast(
        &self,
        application: &str,
        port: u16,
        host: &str,
        stream_name: &str,
        signature: &str,
    ) -> CommandResult<()> {
        self.start_authenticated_broadcast(application, port, host, stream_name, signature, "", "")
    }

    /// [`start_broadcast`] for an ingest that requires source authentication.
    /// Empty `username` means no credentials.
    ///
    /// [`start_broadcast`]: Self::start_broadcast
    #[instrument(skip(self, signature, password))]
    pub fn start_authenticated_broadcast(
        &self,
        application: &str,
        port: u16,
        host: &str,
        stream_name: &str,
        signature: &str,
        username: &str,
        password: &str,
    ) -> CommandResult<()> {
        let signature = Signature::parse(signature)?;
        let mut connection = ConnectionParameters::new(host, port, application, stream_name);
        if !username.is_empty() {
            connection = connection.with_credentials(username, password);
        }
        self.controller.start(connection, signature)?;
        Ok(())
    }

    /// Status line of the broadcast session.
    pub fn get_broadcast_status(&self) -> String {
        self.controller.status_text()
    }

    /// Structured status of the broadcast session.
    pub fn broadcast_status(&self) -> BroadcastStatus {
        self.controller.status()
    }

    /// The asynchronous failure of the last attempt, if it failed.
    pub fn last_failure(&self) -> Option<CommandError> {
        self.controller
            .status()
            .last_error
            .map(|message| CommandError::new(ErrorKind::ConnectionFailure, message))
    }

    /// Stop broadcasting. Safe to call in any state.
    pub fn stop_broadcast(&self) {
        self.controller.stop();
    }

    /// Whether broadcasting works here.
    pub fn is_supported(&self) -> bool {
        self.controller.is_supported()
    }

    /// Whether the signer works here.
    pub fn signing_supported(&self) -> bool {
        self.controller.signing_supported()
    }

    /// Lowercase hex HMAC-SHA256 of `message` under `key`.
    pub fn hmac_sha256(message: &str, key: &str) -> CommandResult<String> {
        let signature = livecast_signing::sign(message, key)?;
        Ok(signature.as_str().to_string())
    }

    /// Drain pending session events without blocking.
    pub fn poll_events(&self) -> CommandResult<Vec<SessionEvent>> {
        let rx = self.event_rx.lock();
        let mut events = Vec::new();

        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(CommandError::new(
                        ErrorKind::Internal,
                        "Event channel disconnected",
                    ));
                }
            }
        }

        debug!(count = events.len(), "Polled events");
        Ok(events)
    }

    /// Drive the broadcast session from a command channel until shutdown.
    ///
    /// Controller transitions are forwarded to `events` alongside the command
    /// replies, so [`poll_events`](Self::poll_events) sees none while serving.
    pub fn serve(&self, commands: Receiver<SessionCommand>, events: Sender<SessionEvent>) {
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            let forward_to = events.clone();
            let done = &done;
            scope.spawn(move || self.forward_events(&forward_to, done));

            run_command_loop(&self.controller, commands, events);
            done.store(true, Ordering::Release);
        });
    }

    fn forward_events(&self, to: &Sender<SessionEvent>, done: &AtomicBool) {
        debug!("Forwarding session events");

        while !done.load(Ordering::Acquire) {
            // Lock per wait so poll_events is never starved for long.
            let received = self.event_rx.lock().recv_timeout(FORWARD_POLL);
            match received {
                Ok(event) => forward(to, event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        // Transitions raised while shutting down.
        let rx = self.event_rx.lock();
        while let Ok(event) = rx.try_recv() {
            forward(to, event);
        }
    }
}

fn forward(to: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = to.try_send(event) {
        warn!("Failed to forward event: {}", e);
    }
}
