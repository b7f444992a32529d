//! In-memory connection doubles for pool and service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

use super::{
    ChainConnection, ConnectionDelegate, ConnectionFactory, ConnectionState, SubscriptionStream,
};

// ============================================================================
// MockConnection
// ============================================================================

/// Connection that records control calls instead of doing I/O.
pub(crate) struct MockConnection {
    name: String,
    url: RwLock<Url>,
    state: Mutex<ConnectionState>,
    delegate: RwLock<Option<Weak<dyn ConnectionDelegate>>>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    reconnects: Mutex<Vec<Url>>,
}

impl MockConnection {
    pub(crate) fn new(name: &str, url: Url) -> Self {
        Self {
            name: name.to_string(),
            url: RwLock::new(url),
            state: Mutex::new(ConnectionState::NotConnected),
            delegate: RwLock::new(None),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            reconnects: Mutex::new(Vec::new()),
        }
    }

    /// Simulates a state transition reported by the socket layer.
    pub(crate) fn emit(&self, to: ConnectionState) {
        let from = std::mem::replace(&mut *self.state.lock(), to);
        let url = self.url.read().clone();
        let delegate = self.delegate.read().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            delegate.connection_did_change_state(&url, from, to);
        }
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reconnects(&self) -> Vec<Url> {
        self.reconnects.lock().clone()
    }

    pub(crate) fn has_delegate(&self) -> bool {
        self.delegate
            .read()
            .as_ref()
            .is_some_and(|delegate| delegate.strong_count() > 0)
    }
}

#[async_trait]
impl ChainConnection for MockConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> Url {
        self.url.read().clone()
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn connect_if_needed(&self) {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnect_if_needed(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn reconnect(&self, url: Url) {
        *self.url.write() = url.clone();
        self.reconnects.lock().push(url);
    }

    fn delegate(&self) -> Option<Weak<dyn ConnectionDelegate>> {
        self.delegate.read().clone()
    }

    fn set_delegate(&self, delegate: Option<Weak<dyn ConnectionDelegate>>) {
        *self.delegate.write() = delegate;
    }

    async fn request(&self, _method: &str, _params: Value) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn subscribe(&self, method: &str, _params: Value) -> Result<SubscriptionStream> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(SubscriptionStream::new(method, rx))
    }
}

// ============================================================================
// MockFactory
// ============================================================================

/// Factory producing [`MockConnection`]s.
///
/// Keeps only weak references so tests control connection lifetime.
#[derive(Default)]
pub(crate) struct MockFactory {
    created: Mutex<Vec<Weak<MockConnection>>>,
    latest: Mutex<Option<Weak<MockConnection>>>,
}

impl MockFactory {
    pub(crate) fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Returns the most recently created connection if still alive.
    pub(crate) fn latest(&self) -> Option<Arc<MockConnection>> {
        self.latest.lock().as_ref().and_then(Weak::upgrade)
    }
}

impl ConnectionFactory for MockFactory {
    fn create_connection(
        &self,
        name: &str,
        url: Url,
        delegate: Weak<dyn ConnectionDelegate>,
    ) -> Arc<dyn ChainConnection> {
        let connection = Arc::new(MockConnection::new(name, url));
        connection.set_delegate(Some(delegate));

        self.created.lock().push(Arc::downgrade(&connection));
        *self.latest.lock() = Some(Arc::downgrade(&connection));

        connection
    }
}

/// Returns `true` if `connection` is the same object as `mock`.
pub(crate) fn is_same(connection: &Arc<dyn ChainConnection>, mock: &Arc<MockConnection>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(connection), Arc::as_ptr(mock))
}
