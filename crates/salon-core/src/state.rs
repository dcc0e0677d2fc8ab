//! Shared readiness state exposed to views.

use std::fmt;

/// Lifecycle of a mirror instance, as seen by the view layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// Constructed, `load` not called yet
    Uninitialized,
    /// Bulk reads in flight
    Loading,
    /// All tables loaded and every feed connected
    Ready,
    /// Usable, but a bulk read failed or a feed is disconnected
    Degraded,
}

impl Readiness {
    /// Whether a view should show a loading indicator.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Loading)
    }

    /// Whether snapshots can be rendered as final data.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Ready | Self::Degraded)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        };
        f.write_str(label)
    }
}
