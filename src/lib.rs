//! Chain Connect - Pooled WebSocket connections to blockchain nodes.
//!
//! This library keeps one JSON-RPC WebSocket connection per chain, fails
//! over between a chain's nodes, and ties the selected account's connection
//! to the application lifecycle.
//!
//! # Architecture
//!
//! - **Pool**: one weakly held connection per chain, plus a failed-node set
//!   per chain driving failover
//! - **Engine**: one task per connection owning the socket, reconnecting
//!   with exponential backoff
//! - **Service**: throttled/active state machine holding the account's
//!   connection and subscriptions
//!
//! Key design principles:
//!
//! - Callers own connections; the pool only discovers them
//! - Failover never locks a chain out, even with a single node
//! - Delegates are weak, so observers never keep connections alive
//!
//! # Quick Start
//!
//! ```no_run
//! use chain_connect::{ConnectionPool, EngineOptions, Result, load_chains};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let chains = load_chains(r#"[{
//!         "chainId": "polkadot",
//!         "name": "Polkadot",
//!         "nodes": [{ "url": "wss://rpc.polkadot.io", "name": "Parity" }]
//!     }]"#)?;
//!
//!     let pool = ConnectionPool::with_options(EngineOptions::default());
//!     let connection = pool.setup_connection(&chains[0])?;
//!
//!     let head = connection
//!         .request("chain_getHeader", serde_json::json!([]))
//!         .await?;
//!     println!("Head: {head}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`chain`] | Chain and node model, JSON loading |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | JSON-RPC message types |
//! | [`service`] | Lifecycle-driven [`WebSocketService`] |
//! | [`transport`] | Connections, engine and [`ConnectionPool`] |
//!
//! # Features
//!
//! - `native-tls`: enables `wss://` endpoints through the platform TLS stack

// ============================================================================
// Modules
// ============================================================================

/// Chain and node configuration.
///
/// Use [`load_chains`] to read the chain list from JSON.
pub mod chain;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// JSON-RPC 2.0 message types.
pub mod protocol;

/// Lifecycle-driven active connection.
pub mod service;

/// Connection contract, WebSocket engine and pool.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Chain types
pub use chain::{Chain, Node, load_chains, load_chains_from_path};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ChainId;

// Service types
pub use service::{
    AddressType, ConnectionProvider, LifecycleEvent, NetworkStatusPresenter, Subscription,
    SubscriptionFactory, TaskSubscription, WebSocketService, WebSocketServiceSettings,
};

// Transport types
pub use transport::{
    ChainConnection, ConnectionDelegate, ConnectionFactory, ConnectionPool,
    ConnectionPoolDelegate, ConnectionState, EngineOptions, FailedUrls, SubscriptionStream,
    WebSocketConnectionFactory, WebSocketEngine,
};
