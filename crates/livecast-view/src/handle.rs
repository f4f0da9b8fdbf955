//! Opaque view handles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    /// Local camera preview.
    Camera,

    /// Playback of an ingest stream.
    Player,
}

/// Token for a provisioned surface.
///
/// Slot index plus the slot's generation, so a released handle never aliases
/// a later surface that reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
    pub(crate) kind: ViewKind,
}

impl ViewHandle {
    /// What the handle shows.
    pub fn kind(&self) -> ViewKind {
        self.kind
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}.{}", self.kind, self.index, self.generation)
    }
}
