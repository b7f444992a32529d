//! Connection factory.
//!
//! The pool never constructs connections itself. It asks a
//! [`ConnectionFactory`], which lets tests and embedders substitute their
//! own [`ChainConnection`] implementation.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use tracing::info;
use url::Url;

use super::connection::{ChainConnection, ConnectionDelegate};
use super::engine::WebSocketEngine;
use super::options::EngineOptions;

// ============================================================================
// ConnectionFactory
// ============================================================================

/// Builds connections for the pool.
pub trait ConnectionFactory: Send + Sync {
    /// Creates a connection named `name` bound to `url`.
    ///
    /// The returned connection reports its state transitions to `delegate`.
    fn create_connection(
        &self,
        name: &str,
        url: Url,
        delegate: Weak<dyn ConnectionDelegate>,
    ) -> Arc<dyn ChainConnection>;
}

// ============================================================================
// WebSocketConnectionFactory
// ============================================================================

/// Default factory producing [`WebSocketEngine`]s.
///
/// Must be used inside a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnectionFactory {
    options: EngineOptions,
}

impl WebSocketConnectionFactory {
    /// Creates a factory whose engines use `options`.
    #[inline]
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Returns the engine options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl ConnectionFactory for WebSocketConnectionFactory {
    fn create_connection(
        &self,
        name: &str,
        url: Url,
        delegate: Weak<dyn ConnectionDelegate>,
    ) -> Arc<dyn ChainConnection> {
        info!(name, url = %url, "Creating connection");
        Arc::new(WebSocketEngine::new(
            name,
            url,
            Some(delegate),
            self.options.clone(),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::transport::ConnectionState;

    struct NoopDelegate;

    impl ConnectionDelegate for NoopDelegate {
        fn connection_did_change_state(&self, _: &Url, _: ConnectionState, _: ConnectionState) {}
    }

    #[tokio::test]
    async fn test_factory_creates_named_engine() {
        let options = EngineOptions::new().with_connect_timeout(Duration::from_millis(200));
        let factory = WebSocketConnectionFactory::new(options.clone());
        assert_eq!(factory.options(), &options);

        let delegate: Arc<dyn ConnectionDelegate> = Arc::new(NoopDelegate);
        let url = Url::parse("ws://127.0.0.1:9").unwrap();

        let connection = factory.create_connection("Polkadot", url.clone(), Arc::downgrade(&delegate));
        assert_eq!(connection.name(), "Polkadot");
        assert_eq!(connection.url(), url);
    }
}
