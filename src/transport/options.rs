//! WebSocket engine options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use chain_connect::EngineOptions;
//!
//! let options = EngineOptions::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_backoff(Duration::from_millis(500), Duration::from_secs(10));
//!
//! assert_eq!(options.backoff_delay(3), Duration::from_secs(2));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a single connect attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a JSON-RPC call.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay after the first failed attempt.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default upper bound for the reconnect delay.
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Default maximum in-flight requests per connection.
const DEFAULT_MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// EngineOptions
// ============================================================================

/// Timeouts, reconnect backoff and limits for a WebSocket engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Timeout for one connect attempt (TCP + handshake).
    pub connect_timeout: Duration,

    /// Timeout for a JSON-RPC call.
    pub request_timeout: Duration,

    /// Delay after the first failed attempt. Doubles per attempt.
    pub backoff_base: Duration,

    /// Upper bound for the reconnect delay.
    pub backoff_cap: Duration,

    /// Maximum in-flight requests before new ones are rejected.
    pub max_pending_requests: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl EngineOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl EngineOptions {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets reconnect backoff base and cap.
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Sets the in-flight request limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }
}

// ============================================================================
// Backoff
// ============================================================================

impl EngineOptions {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped at `backoff_cap`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }
}

// ============================================================================
// Tests
// ============================================================================
