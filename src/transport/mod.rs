//! WebSocket transport layer.
//!
//! This module defines the connection contract the pool works against and
//! ships the default WebSocket implementation of it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  create_connection   ┌────────────────────┐
//! │  ConnectionPool  │─────────────────────►│ ConnectionFactory  │
//! │                  │                      └─────────┬──────────┘
//! │  (delegate)      │                                │
//! │        ▲         │   state transitions  ┌─────────▼──────────┐   WebSocket
//! │        └─────────┼──────────────────────│  ChainConnection   │◄────────────► Node
//! └──────────────────┘                      │  (WebSocketEngine) │   JSON-RPC
//!                                           └────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | `ChainConnection` trait, states, delegate |
//! | `engine` | tokio-tungstenite implementation with reconnect |
//! | `factory` | Connection construction |
//! | `options` | Engine timeouts and backoff |
//! | `pool` | Per-chain connection registry and failover |

// ============================================================================
// Submodules
// ============================================================================

/// Connection contract and state machine.
pub mod connection;

/// WebSocket engine and event loop.
pub mod engine;

/// Connection factories.
pub mod factory;

/// Engine configuration.
pub mod options;

/// Per-chain connection pool with failover.
pub mod pool;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ChainConnection, ConnectionDelegate, ConnectionState, SubscriptionStream};
pub use engine::WebSocketEngine;
pub use factory::{ConnectionFactory, WebSocketConnectionFactory};
pub use options::EngineOptions;
pub use pool::{ConnectionPool, ConnectionPoolDelegate, FailedUrls};
