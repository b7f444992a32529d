//! Active-account WebSocket service.
//!
//! Binds the selected account's chain connection to the application
//! lifecycle: holds it while running, disconnects it in the background and
//! reports reachability to a presenter.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `collaborators` | Provider, subscription and presenter traits |
//! | `lifecycle` | Foreground/background events |
//! | `settings` | Account and network settings |
//! | `websocket` | [`WebSocketService`] state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Provider, subscription and presenter traits.
pub mod collaborators;

/// Application lifecycle events.
pub mod lifecycle;

/// Account and network settings.
pub mod settings;

/// Throttled/active service.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use collaborators::{
    ConnectionProvider, NetworkStatusPresenter, Subscription, SubscriptionFactory,
    TaskSubscription,
};
pub use lifecycle::LifecycleEvent;
pub use settings::{AddressType, WebSocketServiceSettings};
pub use websocket::WebSocketService;
