//! Collaborators of the WebSocket service.
//!
//! The service resolves connections, builds subscriptions and reports
//! reachability through these traits. Storage, runtime metadata and UI live
//! behind them.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::ChainId;
use crate::transport::{ChainConnection, ConnectionPool};

use super::settings::AddressType;

// ============================================================================
// ConnectionProvider
// ============================================================================

/// Looks up the live connection of a chain.
pub trait ConnectionProvider: Send + Sync {
    /// Returns the chain's connection, if one is live.
    fn connection(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainConnection>>;
}

impl ConnectionProvider for ConnectionPool {
    fn connection(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainConnection>> {
        self.get_connection(chain_id)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A live-data subscription held by the service.
///
/// Dropping it cancels the subscription.
pub trait Subscription: Send {}

/// Subscription driven by a spawned task, aborted on drop.
#[derive(Debug)]
pub struct TaskSubscription {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskSubscription {
    /// Spawns `task` on the current Tokio runtime.
    pub fn spawn<F>(name: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            handle: tokio::spawn(task),
        }
    }

    /// Subscription name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Subscription for TaskSubscription {}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        trace!(name = %self.name, "Subscription cancelled");
        self.handle.abort();
    }
}

// ============================================================================
// SubscriptionFactory
// ============================================================================

/// Builds the subscriptions of an account on a connection.
pub trait SubscriptionFactory: Send + Sync {
    /// Creates subscriptions for `address` on `connection`.
    ///
    /// # Errors
    ///
    /// Any error; the service then runs without live updates.
    fn create_subscriptions(
        &self,
        address: &str,
        address_type: &AddressType,
        connection: &Arc<dyn ChainConnection>,
    ) -> Result<Vec<Box<dyn Subscription>>>;
}

// ============================================================================
// NetworkStatusPresenter
// ============================================================================

/// Receives reachability decisions for display.
pub trait NetworkStatusPresenter: Send + Sync {
    /// The active connection is up again.
    fn did_decide_reachable_status_presentation(&self);

    /// The active connection keeps failing to reconnect.
    fn did_decide_unreachable_status_presentation(&self);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_task_subscription_aborts_on_drop() {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let subscription = TaskSubscription::spawn("balance", async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        assert_eq!(subscription.name(), "balance");

        drop(subscription);

        // The aborted task drops its sender, closing the channel.
        assert_eq!(rx.recv().await, None);
    }
}
