//! JSON-RPC 2.0 message types.
//!
//! This module defines the messages exchanged with blockchain nodes over
//! a WebSocket connection.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Wallet → Node | RPC call |
//! | `Response` | Node → Wallet | Result or error for a call |
//! | `Notification` | Node → Wallet | Subscription push |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `notification` | Notification and incoming message types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Subscription notifications.
pub mod notification;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use notification::{Incoming, Notification, NotificationParams, subscription_key};
pub use request::{JSONRPC_VERSION, Request, Response, RpcError};
