//! Subscription notifications and incoming message classification.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use super::Response;

// ============================================================================
// Notification
// ============================================================================

/// A server-pushed subscription update.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "method": "state_storage",
///   "params": { "subscription": "abc", "result": { ... } }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Subscription method name.
    pub method: String,

    /// Subscription id and payload.
    pub params: NotificationParams,
}

/// Payload of a [`Notification`].
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    /// Subscription id, string or number depending on the node.
    pub subscription: Value,

    /// Pushed value.
    #[serde(default)]
    pub result: Value,
}

impl Notification {
    /// Returns the subscription id normalized to a string key.
    #[inline]
    #[must_use]
    pub fn subscription_key(&self) -> String {
        subscription_key(&self.params.subscription)
    }
}

/// Normalizes a subscription id to a map key.
///
/// String ids are used verbatim; anything else uses its JSON text.
#[must_use]
pub fn subscription_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// Any message a node can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    /// Reply to a request.
    Response(Response),
    /// Subscription push.
    Notification(Notification),
}

// ============================================================================
// Tests
// ============================================================================
