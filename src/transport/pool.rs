//! Connection pool with per-chain node failover.
//!
//! Keeps at most one connection per chain, keyed by [`ChainId`]. The pool
//! only *discovers* connections: entries are weak, so a connection lives as
//! long as some subscriber or provider holds it and no longer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ConnectionPool                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ connections (RwLock)                   │  │
//! │  │   polkadot → Weak<ChainConnection>     │  │
//! │  │   kusama   → Weak<ChainConnection>     │  │
//! │  └────────────────────────────────────────┘  │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ failed_urls (RwLock)                   │  │
//! │  │   polkadot → { None, wss://a }         │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The two maps sit behind independent locks so failover bookkeeping never
//! serializes against connection lookups.
//!
//! # Failover
//!
//! Callers report a bad node by passing it as `ignored_url`. The pool adds it
//! to the chain's failed set and picks the first configured node that is
//! neither ignored nor failed. Once the failed set covers every node it is
//! reset to just the latest failure, so some node is always selectable.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};
use url::Url;

use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::identifiers::ChainId;

use super::connection::{ChainConnection, ConnectionDelegate, ConnectionState};
use super::factory::{ConnectionFactory, WebSocketConnectionFactory};
use super::options::EngineOptions;

// ============================================================================
// Types
// ============================================================================

/// Failed node URLs of one chain. `None` marks "no URL tried yet".
pub type FailedUrls = FxHashSet<Option<Url>>;

// ============================================================================
// ConnectionPoolDelegate
// ============================================================================

/// Observer of state changes of every pooled connection.
///
/// Keyed by URL rather than chain, so several chains can share one
/// observer and still tell their connections apart.
pub trait ConnectionPoolDelegate: Send + Sync {
    /// Called when the connection bound to `url` entered `state`.
    fn web_socket_did_change_state(&self, url: &Url, state: ConnectionState);
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Per-chain connection registry with node failover.
///
/// Thread-safe; share it as `Arc<ConnectionPool>`.
///
/// # Example
///
/// ```ignore
/// let pool = ConnectionPool::with_options(EngineOptions::default());
///
/// let connection = pool.setup_connection(&chain)?;
///
/// // The node misbehaved: fail over in place.
/// let connection = pool.setup_connection_ignoring(&chain, Some(&connection.url()))?;
/// ```
pub struct ConnectionPool {
    /// Builds new connections.
    factory: Arc<dyn ConnectionFactory>,

    /// Handle to ourselves, given to connections as their delegate.
    self_ref: Weak<ConnectionPool>,

    /// Single weakly-held observer.
    delegate: RwLock<Option<Weak<dyn ConnectionPoolDelegate>>>,

    /// Failed node URLs by chain.
    failed_urls: RwLock<FxHashMap<ChainId, FailedUrls>>,

    /// Live connections by chain. Never owning.
    connections: RwLock<FxHashMap<ChainId, Weak<dyn ChainConnection>>>,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool {
    /// Creates a pool building connections with `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            factory,
            self_ref: self_ref.clone(),
            delegate: RwLock::new(None),
            failed_urls: RwLock::new(FxHashMap::default()),
            connections: RwLock::new(FxHashMap::default()),
        })
    }

    /// Creates a pool of [`super::WebSocketEngine`]s configured with `options`.
    #[must_use]
    pub fn with_options(options: EngineOptions) -> Arc<Self> {
        Self::new(Arc::new(WebSocketConnectionFactory::new(options)))
    }
}

// ============================================================================
// ConnectionPool - Public API
// ============================================================================

impl ConnectionPool {
    /// Registers the pool observer, replacing any previous one.
    pub fn set_delegate(&self, delegate: Weak<dyn ConnectionPoolDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    /// Returns the chain's connection, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`Error::OnlyOneNode`] if the chain has no selectable node
    pub fn setup_connection(&self, chain: &Chain) -> Result<Arc<dyn ChainConnection>> {
        self.setup_connection_ignoring(chain, None)
    }

    /// Returns the chain's connection, failing over away from `ignored_url`.
    ///
    /// With `ignored_url` set, an existing connection bound elsewhere is
    /// re-targeted in place so its holders keep working.
    ///
    /// # Errors
    ///
    /// - [`Error::OnlyOneNode`] if no node other than `ignored_url` remains
    pub fn setup_connection_ignoring(
        &self,
        chain: &Chain,
        ignored_url: Option<&Url>,
    ) -> Result<Arc<dyn ChainConnection>> {
        if ignored_url.is_none()
            && let Some(connection) = self.get_connection(&chain.chain_id)
        {
            return Ok(connection);
        }

        let chain_failed_urls = self.record_failure(chain, ignored_url);

        let node = chain.selected_node.as_ref().or_else(|| {
            chain.nodes.iter().find(|node| {
                Some(&node.url) != ignored_url && !chain_failed_urls.contains(&Some(node.url.clone()))
            })
        });

        let Some(url) = node.map(|node| node.url.clone()) else {
            warn!(chain_id = %chain.chain_id, nodes = chain.nodes.len(), "No node available");
            return Err(Error::only_one_node(chain.chain_id.clone()));
        };

        self.clear_unused_connections();

        if let Some(connection) = self.get_connection(&chain.chain_id) {
            if connection.url() == url {
                return Ok(connection);
            }

            if let Some(ignored) = ignored_url {
                info!(chain_id = %chain.chain_id, from = %ignored, to = %url, "Failing over");
                connection.reconnect(url);
                return Ok(connection);
            }
        }

        let delegate: Weak<dyn ConnectionDelegate> = self.self_ref.clone();
        let connection = self.factory.create_connection(&chain.name, url, delegate);

        {
            let mut connections = self.connections.write();
            connections.insert(chain.chain_id.clone(), Arc::downgrade(&connection));
        }

        debug!(chain_id = %chain.chain_id, url = %connection.url(), "Connection added to pool");

        Ok(connection)
    }

    /// Returns the chain's live connection, if any.
    #[must_use]
    pub fn get_connection(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainConnection>> {
        self.connections.read().get(chain_id).and_then(Weak::upgrade)
    }

    /// Returns the chain's failed node set, if any failure was recorded.
    #[must_use]
    pub fn failed_urls(&self, chain_id: &ChainId) -> Option<FailedUrls> {
        self.failed_urls.read().get(chain_id).cloned()
    }

    /// Disconnects and forgets the chain's connection.
    ///
    /// Used when the chain's node configuration changed.
    pub fn reset_connection(&self, chain_id: &ChainId) {
        if let Some(connection) = self.get_connection(chain_id) {
            connection.disconnect_if_needed();
        }

        let removed = {
            let mut connections = self.connections.write();
            connections.remove(chain_id)
        };

        if removed.is_some() {
            debug!(chain_id = %chain_id, "Connection removed from pool");
        }
    }

    /// Drops entries whose connection was already released.
    pub fn clear_unused_connections(&self) {
        let mut connections = self.connections.write();
        let before = connections.len();
        connections.retain(|_, connection| connection.strong_count() > 0);

        let pruned = before - connections.len();
        if pruned > 0 {
            debug!(pruned, "Pruned released connections");
        }
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .values()
            .filter(|connection| connection.strong_count() > 0)
            .count()
    }
}

// ============================================================================
// ConnectionPool - Failover Bookkeeping
// ============================================================================

impl ConnectionPool {
    /// Adds `ignored_url` to the chain's failed set and returns the result.
    ///
    /// When the set covers every configured node it is reset to
    /// `{ignored_url}`.
    fn record_failure(&self, chain: &Chain, ignored_url: Option<&Url>) -> FailedUrls {
        let ignored = ignored_url.cloned();

        let mut failed_urls = self.failed_urls.write();
        let chain_failed_urls = failed_urls.entry(chain.chain_id.clone()).or_default();
        chain_failed_urls.insert(ignored.clone());

        if Self::is_exhausted(chain, chain_failed_urls) {
            warn!(
                chain_id = %chain.chain_id,
                nodes = chain.nodes.len(),
                "All nodes failed, keeping only the latest failure"
            );
            chain_failed_urls.clear();
            chain_failed_urls.insert(ignored);
        }

        chain_failed_urls.clone()
    }

    /// Returns `true` if every configured node is in `failed`.
    fn is_exhausted(chain: &Chain, failed: &FailedUrls) -> bool {
        chain
            .nodes
            .iter()
            .all(|node| failed.contains(&Some(node.url.clone())))
    }
}

// ============================================================================
// ConnectionPool - Delegate Relay
// ============================================================================

impl ConnectionDelegate for ConnectionPool {
    fn connection_did_change_state(&self, url: &Url, _from: ConnectionState, to: ConnectionState) {
        let delegate = self.delegate.read().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            delegate.web_socket_did_change_state(url, to);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use proptest::prelude::*;

    use crate::chain::Node;
    use crate::transport::mock::{MockFactory, is_same};

    fn url(host: &str) -> Url {
        Url::parse(&format!("wss://{host}.example")).unwrap()
    }

    fn chain_with(hosts: &[&str]) -> Chain {
        let nodes = hosts.iter().map(|host| Node::new(url(host), *host)).collect();
        Chain::new("testnet", "Testnet", nodes)
    }

    fn mock_pool() -> (Arc<ConnectionPool>, Arc<MockFactory>) {
        let factory = Arc::new(MockFactory::default());
        let pool = ConnectionPool::new(factory.clone());
        (pool, factory)
    }

    fn failed(urls: &[Option<Url>]) -> FailedUrls {
        urls.iter().cloned().collect()
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(Url, ConnectionState)>>,
    }

    impl ConnectionPoolDelegate for Recorder {
        fn web_socket_did_change_state(&self, url: &Url, state: ConnectionState) {
            self.events.lock().push((url.clone(), state));
        }
    }

    #[test]
    fn test_setup_twice_returns_same_instance() {
        let (pool, factory) = mock_pool();
        let chain = chain_with(&["a", "b"]);

        let first = pool.setup_connection(&chain).unwrap();
        let second = pool.setup_connection(&chain).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created_count(), 1);
        assert_eq!(first.name(), "Testnet");
        assert_eq!(first.url(), url("a"));
    }

    #[test]
    fn test_failover_walks_nodes_and_resets_on_exhaustion() {
        let (pool, factory) = mock_pool();
        let chain = chain_with(&["a", "b", "c"]);
        let id = chain.chain_id.clone();

        let connection = pool.setup_connection(&chain).unwrap();
        let mock = factory.latest().unwrap();
        assert!(is_same(&connection, &mock));
        assert_eq!(connection.url(), url("a"));

        let after_a = pool.setup_connection_ignoring(&chain, Some(&url("a"))).unwrap();
        assert!(Arc::ptr_eq(&connection, &after_a));
        assert_eq!(after_a.url(), url("b"));
        assert_eq!(pool.failed_urls(&id), Some(failed(&[None, Some(url("a"))])));

        let after_b = pool.setup_connection_ignoring(&chain, Some(&url("b"))).unwrap();
        assert_eq!(after_b.url(), url("c"));
        assert_eq!(
            pool.failed_urls(&id),
            Some(failed(&[None, Some(url("a")), Some(url("b"))]))
        );

        let after_c = pool.setup_connection_ignoring(&chain, Some(&url("c"))).unwrap();
        assert_eq!(pool.failed_urls(&id), Some(failed(&[Some(url("c"))])));
        assert_eq!(after_c.url(), url("a"));

        assert_eq!(mock.reconnects(), vec![url("b"), url("c"), url("a")]);
        assert_eq!(factory.created_count(), 1);
    }

    #[test]
    fn test_ignored_url_never_returned_unchanged() {
        let (pool, _factory) = mock_pool();
        let chain = chain_with(&["a", "b"]);

        let connection = pool.setup_connection(&chain).unwrap();
        assert_eq!(connection.url(), url("a"));

        let retried = pool.setup_connection_ignoring(&chain, Some(&url("a"))).unwrap();
        assert_ne!(retried.url(), url("a"));
    }

    #[test]
    fn test_single_node_recovers_after_exhaustion() {
        let (pool, _factory) = mock_pool();
        let chain = chain_with(&["a"]);

        let connection = pool.setup_connection(&chain).unwrap();

        let err = pool
            .setup_connection_ignoring(&chain, Some(&url("a")))
            .err()
            .unwrap();
        assert!(matches!(err, Error::OnlyOneNode { .. }));
        assert_eq!(pool.failed_urls(&chain.chain_id), Some(failed(&[Some(url("a"))])));

        // Connection released: the next plain setup must select a node again.
        drop(connection);
        let connection = pool.setup_connection(&chain).unwrap();
        assert_eq!(connection.url(), url("a"));
    }

    #[test]
    fn test_chain_without_nodes_fails() {
        let (pool, factory) = mock_pool();
        let chain = chain_with(&[]);

        let err = pool.setup_connection(&chain).err().unwrap();
        assert!(matches!(err, Error::OnlyOneNode { ref chain_id } if chain_id.as_str() == "testnet"));
        assert_eq!(factory.created_count(), 0);
    }

    #[test]
    fn test_selected_node_preferred() {
        let (pool, _factory) = mock_pool();
        let chain = chain_with(&["a", "b"]).with_selected_node(Node::new(url("b"), "pinned"));

        let connection = pool.setup_connection(&chain).unwrap();
        assert_eq!(connection.url(), url("b"));
    }

    #[test]
    fn test_get_connection_none_after_release() {
        let (pool, _factory) = mock_pool();
        let chain = chain_with(&["a"]);

        let connection = pool.setup_connection(&chain).unwrap();
        assert!(pool.get_connection(&chain.chain_id).is_some());
        assert_eq!(pool.connection_count(), 1);

        drop(connection);
        pool.clear_unused_connections();

        assert!(pool.get_connection(&chain.chain_id).is_none());
        assert_eq!(pool.connection_count(), 0);
    }

    #[test]
    fn test_setup_after_release_creates_new_connection() {
        let (pool, factory) = mock_pool();
        let chain = chain_with(&["a", "b"]);

        drop(pool.setup_connection(&chain).unwrap());
        let _connection = pool.setup_connection(&chain).unwrap();

        assert_eq!(factory.created_count(), 2);
    }

    #[test]
    fn test_reset_connection_disconnects_once() {
        let (pool, factory) = mock_pool();
        let chain = chain_with(&["a"]);

        let _connection = pool.setup_connection(&chain).unwrap();
        let mock = factory.latest().unwrap();

        pool.reset_connection(&chain.chain_id);

        assert_eq!(mock.disconnect_calls(), 1);
        assert!(pool.get_connection(&chain.chain_id).is_none());
    }

    #[test]
    fn test_reset_unknown_chain_is_noop() {
        let (pool, _factory) = mock_pool();
        pool.reset_connection(&ChainId::new("missing"));
        assert_eq!(pool.connection_count(), 0);
    }

    #[test]
    fn test_delegate_relay() {
        let (pool, factory) = mock_pool();
        let recorder = Arc::new(Recorder::default());
        pool.set_delegate(Arc::downgrade(&recorder) as _);

        let _connection = pool.setup_connection(&chain_with(&["a"])).unwrap();
        let mock = factory.latest().unwrap();

        mock.emit(ConnectionState::Connecting { attempt: 1 });
        mock.emit(ConnectionState::Connected);

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![
                (url("a"), ConnectionState::Connecting { attempt: 1 }),
                (url("a"), ConnectionState::Connected),
            ]
        );
    }

    #[test]
    fn test_relay_without_delegate_is_silent() {
        let (pool, factory) = mock_pool();
        let _connection = pool.setup_connection(&chain_with(&["a"])).unwrap();

        {
            let recorder = Arc::new(Recorder::default());
            pool.set_delegate(Arc::downgrade(&recorder) as _);
        }

        factory.latest().unwrap().emit(ConnectionState::Connected);
    }

    #[test]
    fn test_concurrent_lookups_and_failovers() {
        let (pool, _factory) = mock_pool();
        let chains: Vec<Chain> = (0..4)
            .map(|i| {
                let nodes = vec![
                    Node::new(url(&format!("n{i}-a")), "a"),
                    Node::new(url(&format!("n{i}-b")), "b"),
                ];
                Chain::new(format!("chain-{i}"), format!("Chain {i}"), nodes)
            })
            .collect();

        let held: Vec<_> = chains
            .iter()
            .map(|chain| pool.setup_connection(chain).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for chain in &chains {
                let pool = &pool;
                scope.spawn(move || {
                    for round in 0..100 {
                        if round % 10 == 0 {
                            let current = pool.get_connection(&chain.chain_id).unwrap().url();
                            let next = pool.setup_connection_ignoring(chain, Some(&current)).unwrap();
                            assert_ne!(next.url(), current);
                        } else {
                            assert!(pool.get_connection(&chain.chain_id).is_some());
                        }
                    }
                });
            }
        });

        assert_eq!(pool.connection_count(), held.len());
    }

    proptest! {
        #[test]
        fn prop_failover_never_locks_out(
            node_count in 2usize..6,
            picks in proptest::collection::vec(proptest::option::of(0usize..6), 1..40),
        ) {
            let (pool, _factory) = mock_pool();
            let hosts: Vec<String> = (0..node_count).map(|i| format!("node{i}")).collect();
            let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
            let chain = chain_with(&host_refs);

            let mut held = Vec::new();
            for pick in picks {
                let ignored = pick.map(|i| chain.nodes[i % node_count].url.clone());
                let result = pool.setup_connection_ignoring(&chain, ignored.as_ref());
                prop_assert!(result.is_ok());

                let connection = result.unwrap();
                if let Some(ignored) = &ignored {
                    prop_assert_ne!(&connection.url(), ignored);
                }

                let failed = pool.failed_urls(&chain.chain_id).unwrap_or_default();
                prop_assert!(failed.len() <= node_count + 1);
                held.push(connection);
            }
        }
    }
}
