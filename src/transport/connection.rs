//! Chain connection contract.
//!
//! A [`ChainConnection`] is a JSON-RPC-over-WebSocket engine bound to one
//! node URL at a time. The pool creates, discovers and re-targets
//! connections through this trait; it never touches sockets directly.
//!
//! # State Machine
//!
//! ```text
//!                connect                 handshake ok
//! NotConnected ──────────► Connecting(n) ─────────────► Connected
//!      ▲                       │    ▲                       │
//!      │ disconnect     failed │    │ backoff elapsed       │ socket lost
//!      │                       ▼    │                       │
//!      └──────────────── WaitingReconnection(n) ◄───────────┘
//! ```
//!
//! The attempt counter survives a successful handshake. It resets only once
//! a session stays open for the backoff cap, so a node that accepts and then
//! drops sockets keeps climbing the backoff curve.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`ChainConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and no pending connect.
    NotConnected,
    /// Connect attempt in progress. Attempts are numbered from 1.
    Connecting {
        /// Attempt number since the last stable session.
        attempt: u32,
    },
    /// Last attempt failed or its session dropped early; sleeping before
    /// the next one.
    WaitingReconnection {
        /// Number of the attempt that failed.
        attempt: u32,
    },
    /// Socket open and usable.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => f.write_str("not connected"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            Self::WaitingReconnection { attempt } => {
                write!(f, "waiting reconnection (attempt {attempt})")
            }
            Self::Connected => f.write_str("connected"),
        }
    }
}

// ============================================================================
// ConnectionDelegate
// ============================================================================

/// Observer of connection state transitions.
///
/// A connection holds at most one delegate, weakly. Callbacks run on the
/// connection's I/O task and must not block.
pub trait ConnectionDelegate: Send + Sync {
    /// Called after the connection bound to `url` moved from `from` to `to`.
    fn connection_did_change_state(&self, url: &Url, from: ConnectionState, to: ConnectionState);
}

// ============================================================================
// SubscriptionStream
// ============================================================================

/// Receiving end of a node subscription.
///
/// Yields `params.result` of every notification routed to this
/// subscription. Ends when the socket carrying it closes.
#[derive(Debug)]
pub struct SubscriptionStream {
    id: String,
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl SubscriptionStream {
    /// Creates a stream for subscription `id`.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, receiver: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            id: id.into(),
            receiver,
        }
    }

    /// Subscription id assigned by the node.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the next pushed value.
    ///
    /// Returns `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

// ============================================================================
// ChainConnection
// ============================================================================

/// A JSON-RPC connection to one node of a chain.
///
/// Implementations are shared as `Arc<dyn ChainConnection>`. All control
/// methods are non-blocking; the resulting transitions are reported to the
/// delegate asynchronously.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Connection name (usually the chain name), used in logs.
    fn name(&self) -> &str;

    /// URL the connection is currently bound to.
    fn url(&self) -> Url;

    /// Current state.
    fn state(&self) -> ConnectionState;

    /// Starts connecting unless already connected or connecting.
    fn connect_if_needed(&self);

    /// Closes the socket and stops reconnecting, if not already idle.
    fn disconnect_if_needed(&self);

    /// Re-targets the connection to `url` and reconnects in place.
    ///
    /// The object identity is preserved so existing holders keep working.
    fn reconnect(&self, url: Url);

    /// Current state delegate, if any.
    fn delegate(&self) -> Option<Weak<dyn ConnectionDelegate>>;

    /// Replaces the state delegate. `None` detaches the current one.
    fn set_delegate(&self, delegate: Option<Weak<dyn ConnectionDelegate>>);

    /// Performs a JSON-RPC call.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Opens a node subscription via the subscribe `method`.
    async fn subscribe(&self, method: &str, params: Value) -> Result<SubscriptionStream>;
}

// ============================================================================
// Tests
// ============================================================================
