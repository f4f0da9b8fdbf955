//! Platform surface backends.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use livecast_ipc::{ConnectionParameters, StreamQuality};

use crate::error::ProvisioningError;
use crate::ProvisioningResult;

/// Platform-side identifier of a surface.
pub type SurfaceId = u64;

/// What to open for a camera preview.
#[derive(Debug, Clone)]
pub struct CameraSpec {
    /// Key the platform SDK is initialised with.
    pub sdk_key: String,

    /// Capture preset for the preview.
    pub quality: StreamQuality,
}

/// What to open for ingest playback.
#[derive(Debug, Clone)]
pub struct PlayerSpec {
    /// Key the platform SDK is initialised with.
    pub sdk_key: String,

    /// Stream to play.
    pub connection: ConnectionParameters,
}

/// A UI toolkit able to create camera and playback surfaces.
///
/// Platform backends (a camera SDK, a native player) raise `PermissionDenied`
/// when camera or microphone access is refused and `SurfaceUnavailable` when
/// the toolkit cannot create a surface; [`HeadlessSurfaces`] only ever
/// reports `NotSupported`.
pub trait SurfaceBackend: Send + Sync {
    /// Whether the platform can show these surfaces at all.
    fn is_supported(&self) -> bool;

    /// Open a camera preview surface and start the preview.
    fn open_camera(&self, spec: &CameraSpec) -> ProvisioningResult<SurfaceId>;

    /// Open a playback surface and start playing.
    fn open_player(&self, spec: &PlayerSpec) -> ProvisioningResult<SurfaceId>;

    /// Tear a surface down. Unknown ids are ignored.
    fn release(&self, surface: SurfaceId);
}

/// Backend without a display, for servers and tests.
#[derive(Debug)]
pub struct HeadlessSurfaces {
    supported: bool,
    next_id: AtomicU64,
    open: Mutex<HashSet<SurfaceId>>,
    released: AtomicU64,
}

impl HeadlessSurfaces {
    /// A backend that opens surfaces.
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// A backend on a platform without surfaces.
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            supported,
            next_id: AtomicU64::new(1),
            open: Mutex::new(HashSet::new()),
            released: AtomicU64::new(0),
        }
    }

    /// Number of surfaces currently open.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Number of releases that closed an open surface.
    pub fn release_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn open_surface(&self) -> ProvisioningResult<SurfaceId> {
        if !self.supported {
            return Err(ProvisioningError::NotSupported);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.lock().insert(id);
        Ok(id)
    }
}

impl Default for HeadlessSurfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceBackend for HeadlessSurfaces {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn open_camera(&self, spec: &CameraSpec) -> ProvisioningResult<SurfaceId> {
        let id = self.open_surface()?;
        debug!(surface = id, quality = ?spec.quality, "Headless camera surface opened");
        Ok(id)
    }

    fn open_player(&self, spec: &PlayerSpec) -> ProvisioningResult<SurfaceId> {
        let id = self.open_surface()?;
        debug!(surface = id, target = %spec.connection.target(), "Headless player surface opened");
        Ok(id)
    }

    fn release(&self, surface: SurfaceId) {
        if self.open.lock().remove(&surface) {
            self.released.fetch_add(1, Ordering::Relaxed);
        }
    }
}
