//! Chain and node model types.
//!
//! Field names follow the camelCase layout of the chain registry JSON.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::identifiers::ChainId;

// ============================================================================
// Node
// ============================================================================

/// One RPC endpoint configured for a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// WebSocket URL of the node.
    pub url: Url,

    /// Display name.
    pub name: String,
}

impl Node {
    /// Creates a node.
    #[inline]
    #[must_use]
    pub fn new(url: Url, name: impl Into<String>) -> Self {
        Self {
            url,
            name: name.into(),
        }
    }
}

// ============================================================================
// Chain
// ============================================================================

/// A blockchain network with its candidate nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    /// Stable chain identifier.
    pub chain_id: ChainId,

    /// Display name, also used as the connection name.
    pub name: String,

    /// Candidate nodes in failover order.
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Node pinned by the user. Always preferred when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_node: Option<Node>,
}

impl Chain {
    /// Creates a chain with no pinned node.
    #[must_use]
    pub fn new(chain_id: impl Into<ChainId>, name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            chain_id: chain_id.into(),
            name: name.into(),
            nodes,
            selected_node: None,
        }
    }

    /// Pins a node.
    #[inline]
    #[must_use]
    pub fn with_selected_node(mut self, node: Node) -> Self {
        self.selected_node = Some(node);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
