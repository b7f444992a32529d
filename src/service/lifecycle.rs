//! Application lifecycle events.
//!
//! The host platform feeds these into the service; the service has no
//! dependency on any platform lifecycle API.

/// Application moved between foreground and background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The application became active.
    Foregrounded,
    /// The application entered the background.
    Backgrounded,
}
