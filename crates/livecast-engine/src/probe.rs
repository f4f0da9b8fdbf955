//! Capability probing.

use livecast_ipc::CapabilityMode;

/// Reports whether broadcasting and signing work here.
pub trait CapabilityProbe: Send + Sync {
    /// Camera plus publish pipeline usable.
    fn broadcast_supported(&self) -> bool;

    /// Signing primitive usable.
    fn signing_supported(&self) -> bool {
        livecast_signing::is_supported()
    }
}

/// Probe driven by configuration and the build target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformProbe {
    mode: CapabilityMode,
}

impl PlatformProbe {
    /// Create a probe for `mode`.
    pub fn new(mode: CapabilityMode) -> Self {
        Self { mode }
    }
}

impl CapabilityProbe for PlatformProbe {
    fn broadcast_supported(&self) -> bool {
        match self.mode {
            CapabilityMode::Enabled => true,
            CapabilityMode::Disabled => false,
            // Publishing needs a TCP stack.
            CapabilityMode::Auto => cfg!(not(target_family = "wasm")),
        }
    }
}

/// Fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl CapabilityProbe for StaticProbe {
    fn broadcast_supported(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert!(PlatformProbe::new(CapabilityMode::Enabled).broadcast_supported());
        assert!(!PlatformProbe::new(CapabilityMode::Disabled).broadcast_supported());
        assert_eq!(
            PlatformProbe::default().broadcast_supported(),
            cfg!(not(target_family = "wasm"))
        );
    }

    #[test]
    fn test_signing_always_supported() {
        assert!(StaticProbe(false).signing_supported());
    }
}
