//! Host bridge for live camera broadcasting.
//!
//! [`LivecastBridge`] is the surface a host application calls: camera and
//! playback views, broadcast start/status/stop, capability checks and the
//! HMAC-SHA256 signer.

mod commands;
mod config;
mod error;

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livecast_engine::{BroadcastController, ControllerOptions, PlatformProbe};
use livecast_ipc::{event_channel, SessionEvent};
use livecast_transport::RtmpPublisher;
use livecast_view::{HeadlessSurfaces, SurfaceBackend, ViewProvisioner};

pub use config::{BridgeConfig, ConfigError, ConfigOverrides};
pub use error::{CommandError, CommandResult, ErrorKind};

/// Per-crate fallback when `RUST_LOG` is unset.
const LOG_TARGETS: [&str; 6] = [
    "livecast",
    "livecast_lib",
    "livecast_engine",
    "livecast_signing",
    "livecast_transport",
    "livecast_view",
];

/// Initialize logging. Later calls are ignored.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let fallback = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Everything the host talks to.
pub struct LivecastBridge {
    controller: BroadcastController<RtmpPublisher>,
    views: ViewProvisioner,
    config: BridgeConfig,
    event_rx: Mutex<Receiver<SessionEvent>>,
}

impl LivecastBridge {
    /// Bridge without a display.
    pub fn new(config: BridgeConfig) -> CommandResult<Self> {
        Self::with_surfaces(config, Arc::new(HeadlessSurfaces::new()))
    }

    /// Bridge drawing views through `surfaces`.
    pub fn with_surfaces(
        config: BridgeConfig,
        surfaces: Arc<dyn SurfaceBackend>,
    ) -> CommandResult<Self> {
        config
            .validate()
            .map_err(|e| CommandError::new(ErrorKind::InvalidInput, e.to_string()))?;

        let (event_tx, event_rx) = event_channel();
        let controller = BroadcastController::new(
            RtmpPublisher::new(config.handshake_timeouts()),
            PlatformProbe::new(config.broadcast_capability),
            ControllerOptions {
                conflict_policy: config.conflict_policy,
                quality: config.quality,
                events: Some(event_tx),
                ..Default::default()
            },
        )?;
        let views = ViewProvisioner::new(surfaces, config.sdk_key.clone(), config.quality);

        info!(
            quality = ?config.quality,
            conflict_policy = ?config.conflict_policy,
            "Bridge ready"
        );

        Ok(Self {
            controller,
            views,
            config,
            event_rx: Mutex::new(event_rx),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
