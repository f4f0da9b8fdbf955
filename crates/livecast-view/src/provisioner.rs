//! Handle arena over a surface backend.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use livecast_ipc::{ConnectionParameters, StreamQuality};

use crate::error::ProvisioningError;
use crate::handle::{ViewHandle, ViewKind};
use crate::surface::{CameraSpec, PlayerSpec, SurfaceBackend, SurfaceId};
use crate::ProvisioningResult;

struct Slot {
    generation: u32,
    entry: Option<(ViewKind, SurfaceId)>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    camera: Option<ViewHandle>,
    player: Option<ViewHandle>,
}

impl Arena {
    fn insert(&mut self, kind: ViewKind, surface: SurfaceId) -> ViewHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some((kind, surface));
        ViewHandle {
            index,
            generation: slot.generation,
            kind,
        }
    }

    fn get(&self, handle: ViewHandle) -> Option<SurfaceId> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.map(|(_, surface)| surface)
    }

    fn remove(&mut self, handle: ViewHandle) -> Option<SurfaceId> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let (_, surface) = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        if self.camera == Some(handle) {
            self.camera = None;
        }
        if self.player == Some(handle) {
            self.player = None;
        }
        Some(surface)
    }
}

/// Hands out camera preview and playback views.
///
/// There is at most one camera preview and one player at a time: asking for
/// the camera again returns the live preview, asking for a new player
/// replaces the current one.
pub struct ViewProvisioner {
    backend: Arc<dyn SurfaceBackend>,
    sdk_key: String,
    quality: StreamQuality,
    arena: Mutex<Arena>,
}

impl ViewProvisioner {
    /// Create a provisioner over `backend`.
    pub fn new(backend: Arc<dyn SurfaceBackend>, sdk_key: String, quality: StreamQuality) -> Self {
        Self {
            backend,
            sdk_key,
            quality,
            arena: Mutex::new(Arena::default()),
        }
    }

    /// Whether the backend can show views.
    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    /// Camera preview view.
    ///
    /// `sdk_key` overrides the configured SDK key when non-empty.
    #[instrument(skip(self, sdk_key))]
    pub fn camera_view(&self, sdk_key: &str) -> ProvisioningResult<ViewHandle> {
        let sdk_key = self.effective_key(sdk_key)?;

        let mut arena = self.arena.lock();
        if let Some(handle) = arena.camera {
            if arena.get(handle).is_some() {
                debug!(%handle, "Reusing camera preview");
                return Ok(handle);
            }
        }

        let surface = self.backend.open_camera(&CameraSpec {
            sdk_key,
            quality: self.quality,
        })?;
        let handle = arena.insert(ViewKind::Camera, surface);
        arena.camera = Some(handle);

        info!(%handle, quality = ?self.quality, "Camera preview started");
        Ok(handle)
    }

    /// Playback view for `connection`, replacing any current player.
    #[instrument(skip(self, connection), fields(target = %connection.target()))]
    pub fn player_view(&self, connection: ConnectionParameters) -> ProvisioningResult<ViewHandle> {
        connection
            .validate()
            .map_err(|e| ProvisioningError::InvalidParameters(e.to_string()))?;
        let sdk_key = self.effective_key("")?;

        let mut arena = self.arena.lock();
        if let Some(previous) = arena.player {
            if let Some(surface) = arena.remove(previous) {
                debug!(%previous, "Replacing current player");
                self.backend.release(surface);
            }
        }

        let surface = self.backend.open_player(&PlayerSpec {
            sdk_key,
            connection,
        })?;
        let handle = arena.insert(ViewKind::Player, surface);
        arena.player = Some(handle);

        info!(%handle, "Playback started");
        Ok(handle)
    }

    /// Stop the current player. A no-op when nothing is playing.
    pub fn stop_player(&self) {
        let mut arena = self.arena.lock();
        match arena.player {
            Some(handle) => {
                if let Some(surface) = arena.remove(handle) {
                    self.backend.release(surface);
                    info!(%handle, "Playback stopped");
                }
            }
            None => debug!("No player to stop"),
        }
    }

    /// Release `handle`. Returns false if it was already released.
    pub fn release(&self, handle: ViewHandle) -> bool {
        let surface = self.arena.lock().remove(handle);
        match surface {
            Some(surface) => {
                self.backend.release(surface);
                debug!(%handle, "View released");
                true
            }
            None => {
                debug!(%handle, "View already released");
                false
            }
        }
    }

    /// Whether `handle` still refers to a live surface.
    pub fn is_live(&self, handle: ViewHandle) -> bool {
        self.arena.lock().get(handle).is_some()
    }

    /// Release every view.
    pub fn release_all(&self) {
        let mut arena = self.arena.lock();
        let live: Vec<ViewHandle> = arena
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entry.map(|(kind, _)| ViewHandle {
                    index: index as u32,
                    generation: slot.generation,
                    kind,
                })
            })
            .collect();
        for handle in live {
            if let Some(surface) = arena.remove(handle) {
                self.backend.release(surface);
            }
        }
    }

    fn effective_key(&self, override_key: &str) -> ProvisioningResult<String> {
        if !self.backend.is_supported() {
            warn!("Views are not supported on this platform");
            return Err(ProvisioningError::NotSupported);
        }
        let key = if override_key.is_empty() {
            &self.sdk_key
        } else {
            override_key
        };
        if key.is_empty() {
            return Err(ProvisioningError::InvalidParameters(
                "SDK key is not configured".to_string(),
            ));
        }
        Ok(key.to_string())
    }
}

impl Drop for ViewProvisioner {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurfaces;

    fn provisioner() -> (Arc<HeadlessSurfaces>, ViewProvisioner) {
        let backend = Arc::new(HeadlessSurfaces::new());
        let provisioner =
            ViewProvisioner::new(backend.clone(), "sdk-key".to_string(), StreamQuality::default());
        (backend, provisioner)
    }

    fn target() -> ConnectionParameters {
        ConnectionParameters::new("wowza.example.com", 1935, "live", "cam1")
    }

    #[test]
    fn test_camera_view_is_reused() {
        let (backend, provisioner) = provisioner();
        let first = provisioner.camera_view("").unwrap();
        let second = provisioner.camera_view("").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.kind(), ViewKind::Camera);
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn test_player_view_replaces_previous() {
        let (backend, provisioner) = provisioner();
        let first = provisioner.player_view(target()).unwrap();
        let second = provisioner.player_view(target()).unwrap();

        assert_ne!(first, second);
        assert!(!provisioner.is_live(first));
        assert!(provisioner.is_live(second));
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn test_player_view_rejects_invalid_parameters() {
        let (_, provisioner) = provisioner();
        let err = provisioner
            .player_view(ConnectionParameters::new("host", 1935, "", "cam1"))
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidParameters(_)));
    }

    #[test]
    fn test_stop_player_is_idempotent() {
        let (backend, provisioner) = provisioner();
        provisioner.stop_player();

        provisioner.player_view(target()).unwrap();
        provisioner.stop_player();
        provisioner.stop_player();

        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.release_count(), 1);
    }

    #[test]
    fn test_release_is_idempotent_and_stale_handles_do_not_alias() {
        let (backend, provisioner) = provisioner();
        let camera = provisioner.camera_view("").unwrap();

        assert!(provisioner.release(camera));
        assert!(!provisioner.release(camera));

        // Reuses the freed slot under a new generation.
        let player = provisioner.player_view(target()).unwrap();
        assert!(!provisioner.release(camera));
        assert!(provisioner.is_live(player));
        assert_eq!(backend.release_count(), 1);
    }

    #[test]
    fn test_missing_sdk_key() {
        let backend = Arc::new(HeadlessSurfaces::new());
        let provisioner = ViewProvisioner::new(backend, String::new(), StreamQuality::default());

        assert!(matches!(
            provisioner.camera_view(""),
            Err(ProvisioningError::InvalidParameters(_))
        ));
        assert!(provisioner.camera_view("explicit-key").is_ok());
    }

    #[test]
    fn test_unsupported_platform() {
        let backend = Arc::new(HeadlessSurfaces::unsupported());
        let provisioner = ViewProvisioner::new(backend, "k".to_string(), StreamQuality::default());

        assert!(!provisioner.is_supported());
        assert_eq!(
            provisioner.camera_view(""),
            Err(ProvisioningError::NotSupported)
        );
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = Arc::new(HeadlessSurfaces::new());
        {
            let provisioner =
                ViewProvisioner::new(backend.clone(), "k".to_string(), StreamQuality::default());
            provisioner.camera_view("").unwrap();
            provisioner.player_view(target()).unwrap();
            assert_eq!(backend.open_count(), 2);
        }
        assert_eq!(backend.open_count(), 0);
    }
}
