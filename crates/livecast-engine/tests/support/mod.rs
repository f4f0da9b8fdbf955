//! A publisher whose handshakes the test resolves by hand.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use livecast_engine::{BroadcastController, ControllerOptions, StaticProbe};
use livecast_ipc::{ConnectionParameters, Signature};
use livecast_transport::{
    Established, PublishRequest, PublishSession, Publisher, TransportError, TransportResult,
};

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

type Outcome = TransportResult<Established<LiveLink>>;
type LossSlot = Arc<Mutex<Option<oneshot::Sender<TransportError>>>>;

/// Publisher that parks every handshake until the test decides its outcome.
pub struct ScriptedPublisher {
    pending: Sender<Pending>,
    closes: Arc<AtomicUsize>,
}

/// Test side of a [`ScriptedPublisher`].
pub struct Script {
    pending: Receiver<Pending>,
    closes: Arc<AtomicUsize>,
}

pub fn scripted() -> (ScriptedPublisher, Script) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let closes = Arc::new(AtomicUsize::new(0));
    (
        ScriptedPublisher {
            pending: tx,
            closes: Arc::clone(&closes),
        },
        Script {
            pending: rx,
            closes,
        },
    )
}

impl Script {
    /// Wait for the controller to begin a handshake.
    pub fn next_handshake(&self) -> Pending {
        self.pending
            .recv_timeout(WAIT_LIMIT)
            .expect("no handshake was started")
    }

    /// A handshake, if one is already waiting.
    pub fn try_next(&self) -> Option<Pending> {
        self.pending.try_recv().ok()
    }

    /// Number of link releases so far.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// A parked handshake.
pub struct Pending {
    pub request: PublishRequest,
    gate: oneshot::Sender<Outcome>,
    closes: Arc<AtomicUsize>,
}

impl Pending {
    /// Let the backend accept the publish.
    pub fn succeed(self) -> LinkControl {
        let (lost_tx, lost_rx) = oneshot::channel();
        let loss: LossSlot = Arc::new(Mutex::new(Some(lost_tx)));
        let link = LiveLink {
            loss: Arc::clone(&loss),
            closes: self.closes,
        };
        let _ = self.gate.send(Ok(Established {
            session: link,
            link: lost_rx,
        }));
        LinkControl { loss }
    }

    /// Let the handshake fail.
    pub fn fail(self, message: &str) {
        let _ = self
            .gate
            .send(Err(TransportError::ConnectionFailed(message.to_string())));
    }
}

/// Drops an established link from the server side.
pub struct LinkControl {
    loss: LossSlot,
}

impl LinkControl {
    pub fn drop_link(&self, message: &str) {
        if let Some(lost) = self.loss.lock().take() {
            let _ = lost.send(TransportError::ConnectionLost(message.to_string()));
        }
    }
}

/// Link handed to the controller on success.
pub struct LiveLink {
    loss: LossSlot,
    closes: Arc<AtomicUsize>,
}

impl PublishSession for LiveLink {
    fn close(self) -> impl Future<Output = ()> + Send + 'static {
        async move {
            self.loss.lock().take();
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Publisher for ScriptedPublisher {
    type Session = LiveLink;

    fn connect(&self, request: PublishRequest) -> impl Future<Output = Outcome> + Send + 'static {
        let (gate, outcome) = oneshot::channel();
        let parked = self.pending.send(Pending {
            request,
            gate,
            closes: Arc::clone(&self.closes),
        });

        async move {
            if parked.is_err() {
                return Err(TransportError::ConnectionFailed("script dropped".to_string()));
            }
            match outcome.await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::ConnectionFailed(
                    "handshake abandoned".to_string(),
                )),
            }
        }
    }
}

pub fn controller(options: ControllerOptions) -> (BroadcastController<ScriptedPublisher>, Script) {
    controller_with_probe(StaticProbe(true), options)
}

pub fn controller_with_probe(
    probe: StaticProbe,
    options: ControllerOptions,
) -> (BroadcastController<ScriptedPublisher>, Script) {
    let (publisher, script) = scripted();
    let controller =
        BroadcastController::new(publisher, probe, options).expect("controller runtime");
    (controller, script)
}

pub fn wowza() -> ConnectionParameters {
    ConnectionParameters::new("wowza.example.com", 1935, "live", "cam1")
}

pub fn signature() -> Signature {
    livecast_signing::sign("live/cam1", "secretKey").expect("signature")
}

/// Poll `condition` until it holds or the wait limit passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}
