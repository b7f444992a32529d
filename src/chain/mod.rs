//! Chain and node configuration.
//!
//! A [`Chain`] is a blockchain network the wallet can connect to. It carries
//! an ordered list of candidate [`Node`]s and an optional user-pinned node.
//! The pool walks the list in order when failing over.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Chain`] | Chain id, display name, node list, pinned node |
//! | [`Node`] | One RPC endpoint |
//! | [`load_chains`] | Parses and validates a JSON chain list |
//!
//! # Example
//!
//! ```
//! use chain_connect::chain::load_chains;
//!
//! let chains = load_chains(r#"[{
//!     "chainId": "polkadot",
//!     "name": "Polkadot",
//!     "nodes": [{ "url": "wss://rpc.polkadot.io", "name": "Parity" }]
//! }]"#).unwrap();
//!
//! assert_eq!(chains[0].nodes.len(), 1);
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// JSON chain list loading and validation.
pub mod config;

/// Chain and node model types.
pub mod model;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{load_chains, load_chains_from_path};
pub use model::{Chain, Node};
