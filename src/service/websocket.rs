//! Throttled/active lifecycle around the selected account's connection.
//!
//! # States
//!
//! | State | Meaning |
//! |-------|---------|
//! | Throttled | No connection held, lifecycle events ignored |
//! | Active + Foreground | Connection held and kept connected |
//! | Active + Background | Connection held but disconnected |
//!
//! ```text
//!   Throttled ──setup()──► Active/Foreground ◄──Foregrounded──┐
//!       ▲                        │                            │
//!       └──────throttle()────────┤──Backgrounded──► Active/Background
//! ```
//!
//! The service starts throttled. While active it sits in the connection's
//! delegate slot, turns state changes into reachability decisions and
//! forwards every transition to the delegate it displaced (normally the
//! pool). Teardown puts that delegate back.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::{ChainConnection, ConnectionDelegate, ConnectionState};

use super::collaborators::{
    ConnectionProvider, NetworkStatusPresenter, Subscription, SubscriptionFactory,
};
use super::lifecycle::LifecycleEvent;
use super::settings::WebSocketServiceSettings;

// ============================================================================
// ServiceState
// ============================================================================

/// Mutable service state, guarded by one lock.
struct ServiceState {
    settings: WebSocketServiceSettings,
    connection: Option<Arc<dyn ChainConnection>>,
    subscriptions: Option<Vec<Box<dyn Subscription>>>,
    is_throttled: bool,
    is_active: bool,
}

// ============================================================================
// WebSocketService
// ============================================================================

/// Owns the active connection and subscriptions of the selected account.
///
/// Public operations are serialized. The state lock is never held while
/// calling into a connection, the subscription factory or the presenter.
pub struct WebSocketService {
    /// Self reference handed to connections as their delegate.
    self_ref: Weak<WebSocketService>,

    provider: Arc<dyn ConnectionProvider>,
    subscription_factory: Arc<dyn SubscriptionFactory>,
    presenter: RwLock<Option<Arc<dyn NetworkStatusPresenter>>>,

    /// Delegate displaced from the held connection, forwarded to and
    /// restored on teardown.
    displaced: RwLock<Option<Weak<dyn ConnectionDelegate>>>,

    /// Serializes setup, throttle, update and lifecycle handling.
    operation: Mutex<()>,
    state: Mutex<ServiceState>,
}

impl WebSocketService {
    /// Creates a throttled service.
    #[must_use]
    pub fn new(
        settings: WebSocketServiceSettings,
        provider: Arc<dyn ConnectionProvider>,
        subscription_factory: Arc<dyn SubscriptionFactory>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            provider,
            subscription_factory,
            presenter: RwLock::new(None),
            displaced: RwLock::new(None),
            operation: Mutex::new(()),
            state: Mutex::new(ServiceState {
                settings,
                connection: None,
                subscriptions: None,
                is_throttled: true,
                is_active: true,
            }),
        })
    }

    /// Sets the reachability presenter.
    pub fn set_network_status_presenter(&self, presenter: Arc<dyn NetworkStatusPresenter>) {
        *self.presenter.write() = Some(presenter);
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Leaves the throttled state and establishes the active connection.
    ///
    /// Enters the foreground: lifecycle events missed while throttled are
    /// not replayed, so the connection is asked to connect. No-op if
    /// already active.
    pub fn setup(&self) {
        let _operation = self.operation.lock();

        {
            let mut state = self.state.lock();
            if !state.is_throttled {
                return;
            }
            state.is_throttled = false;
            state.is_active = true;
        }

        info!("WebSocket service started");

        if let Some(connection) = self.setup_connection() {
            connection.connect_if_needed();
        }
    }

    /// Releases the connection and subscriptions and enters the throttled
    /// state.
    ///
    /// No-op if already throttled.
    pub fn throttle(&self) {
        let _operation = self.operation.lock();

        {
            let mut state = self.state.lock();
            if state.is_throttled {
                return;
            }
            state.is_throttled = true;
        }

        self.clear_connection();
        info!("WebSocket service throttled");
    }

    /// Replaces the settings.
    ///
    /// Equal settings are ignored. While active the connection is rebuilt
    /// for the new settings; while throttled they are only stored.
    pub fn update(&self, settings: WebSocketServiceSettings) {
        let _operation = self.operation.lock();

        let (is_throttled, is_active) = {
            let mut state = self.state.lock();
            if state.settings == settings {
                return;
            }
            state.settings = settings;
            (state.is_throttled, state.is_active)
        };

        if is_throttled {
            debug!("Settings stored while throttled");
            return;
        }

        self.clear_connection();

        let connection = self.setup_connection();
        if !is_active && let Some(connection) = connection {
            connection.disconnect_if_needed();
        }
    }

    /// Applies a foreground/background transition.
    ///
    /// Ignored while throttled and when the transition does not change the
    /// active flag.
    pub fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        let _operation = self.operation.lock();

        let connection = {
            let mut state = self.state.lock();
            if state.is_throttled {
                return;
            }

            match event {
                LifecycleEvent::Foregrounded if !state.is_active => state.is_active = true,
                LifecycleEvent::Backgrounded if state.is_active => state.is_active = false,
                _ => return,
            }

            state.connection.clone()
        };

        debug!(?event, "Lifecycle transition");

        if let Some(connection) = connection {
            match event {
                LifecycleEvent::Foregrounded => connection.connect_if_needed(),
                LifecycleEvent::Backgrounded => connection.disconnect_if_needed(),
            }
        }
    }

    /// Feeds lifecycle events from `events` into the service.
    ///
    /// The task ends when the channel closes or the service is dropped.
    pub fn listen_lifecycle(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        let service = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.handle_lifecycle_event(event);
            }
            debug!("Lifecycle listener stopped");
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> WebSocketServiceSettings {
        self.state.lock().settings.clone()
    }

    /// Active connection, if any.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<dyn ChainConnection>> {
        self.state.lock().connection.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state
            .lock()
            .subscriptions
            .as_ref()
            .map_or(0, Vec::len)
    }

    /// Returns `true` while throttled.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.state.lock().is_throttled
    }

    /// Returns `true` while in the foreground.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().is_active
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Releases the connection, dropping subscriptions and handing the
    /// delegate slot back to the delegate it displaced.
    ///
    /// The pooled connection itself stays up for its other holders.
    fn clear_connection(&self) {
        let (connection, subscriptions) = {
            let mut state = self.state.lock();
            (state.connection.take(), state.subscriptions.take())
        };
        let displaced = self.displaced.write().take();

        if let Some(connection) = connection {
            connection.set_delegate(displaced);
            debug!(name = %connection.name(), "Released active connection");
        }

        drop(subscriptions);
    }

    /// Resolves the connection for the current settings and subscribes.
    ///
    /// Returns the connection now held, if any.
    fn setup_connection(&self) -> Option<Arc<dyn ChainConnection>> {
        let settings = self.state.lock().settings.clone();

        let (Some(address), Some(address_type)) =
            (settings.address.as_deref(), settings.address_type.as_ref())
        else {
            debug!("No account selected, running without connection");
            return None;
        };

        let Some(connection) = self.provider.connection(&address_type.chain_id) else {
            debug!(chain_id = %address_type.chain_id, "No live connection for chain");
            return None;
        };

        let displaced = connection
            .delegate()
            .filter(|delegate| !std::ptr::addr_eq(delegate.as_ptr(), self as *const Self));
        *self.displaced.write() = displaced;

        let delegate: Weak<dyn ConnectionDelegate> = self.self_ref.clone();
        connection.set_delegate(Some(delegate));

        let subscriptions = match self.subscription_factory.create_subscriptions(
            address,
            address_type,
            &connection,
        ) {
            Ok(subscriptions) => Some(subscriptions),
            Err(e) => {
                warn!(
                    chain_id = %address_type.chain_id,
                    error = %e,
                    "Subscription setup failed, continuing without live updates"
                );
                None
            }
        };

        info!(
            chain_id = %address_type.chain_id,
            subscriptions = subscriptions.as_ref().map_or(0, Vec::len),
            "Active connection ready"
        );

        let mut state = self.state.lock();
        state.connection = Some(Arc::clone(&connection));
        state.subscriptions = subscriptions;

        Some(connection)
    }
}

// ============================================================================
// ConnectionDelegate
// ============================================================================

impl ConnectionDelegate for WebSocketService {
    fn connection_did_change_state(&self, url: &Url, from: ConnectionState, to: ConnectionState) {
        let displaced = self.displaced.read().as_ref().and_then(Weak::upgrade);
        if let Some(displaced) = displaced {
            displaced.connection_did_change_state(url, from, to);
        }

        let presenter = self.presenter.read().clone();
        let Some(presenter) = presenter else {
            return;
        };

        match to {
            ConnectionState::Connecting { attempt } if attempt > 1 => {
                debug!(%url, attempt, "Connection unreachable");
                presenter.did_decide_unreachable_status_presentation();
            }
            ConnectionState::Connected => {
                debug!(%url, "Connection reachable");
                presenter.did_decide_reachable_status_presentation();
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
