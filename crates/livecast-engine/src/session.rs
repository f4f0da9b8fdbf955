//! The single broadcast session record.

use livecast_ipc::{BroadcastState, BroadcastStatus, ConnectionParameters};

/// Mutable session record, guarded by the controller lock.
pub(crate) struct BroadcastSession<S> {
    state: BroadcastState,
    connection: Option<ConnectionParameters>,
    last_error: Option<String>,
    generation: u64,
    link: Option<S>,
}

impl<S> BroadcastSession<S> {
    pub(crate) fn new() -> Self {
        Self {
            state: BroadcastState::Idle,
            connection: None,
            last_error: None,
            generation: 0,
            link: None,
        }
    }

    pub(crate) fn state(&self) -> &BroadcastState {
        &self.state
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` is still the live attempt and in an expected state.
    pub(crate) fn is_current(&self, generation: u64, expected: fn(&BroadcastState) -> bool) -> bool {
        self.generation == generation && expected(&self.state)
    }

    /// Open a new attempt and return its generation.
    pub(crate) fn begin(&mut self, connection: ConnectionParameters) -> u64 {
        self.generation += 1;
        self.connection = Some(connection);
        self.last_error = None;
        self.generation
    }

    /// Replace the state, returning the previous one.
    pub(crate) fn set_state(&mut self, state: BroadcastState) -> BroadcastState {
        std::mem::replace(&mut self.state, state)
    }

    pub(crate) fn record_error(&mut self, reason: String) {
        self.last_error = Some(reason);
    }

    pub(crate) fn clear_error(&mut self) -> bool {
        self.last_error.take().is_some()
    }

    /// Install the accepted link. Returns any link already held.
    pub(crate) fn install_link(&mut self, link: S) -> Option<S> {
        self.link.replace(link)
    }

    /// Hand the link out for release. Yields it at most once.
    pub(crate) fn take_link(&mut self) -> Option<S> {
        self.link.take()
    }

    pub(crate) fn snapshot(&self) -> BroadcastStatus {
        BroadcastStatus {
            state: self.state.clone(),
            connection: self.connection.clone(),
            last_error: self.last_error.clone(),
            generation: self.generation,
        }
    }
}
