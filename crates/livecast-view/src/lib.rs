//! Camera preview and playback view provisioning.
//!
//! Platform surfaces never cross into the core. The host gets an opaque
//! [`ViewHandle`] and hands it back to release the surface.

mod error;
mod handle;
mod provisioner;
mod surface;

pub use error::ProvisioningError;
pub use handle::{ViewHandle, ViewKind};
pub use provisioner::ViewProvisioner;
pub use surface::{CameraSpec, HeadlessSurfaces, PlayerSpec, SurfaceBackend, SurfaceId};

/// Result type for provisioning operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;
