//! Type-safe identifiers.
//!
//! Chain ids come from configuration (typically a genesis hash) and are
//! compared by value. The newtype keeps them from being confused with node
//! names or URLs in map keys and log fields.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// ChainId
// ============================================================================

/// Stable identifier of a chain.
///
/// Cheap to clone: the inner string is reference-counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(Arc<str>);

impl ChainId {
    /// Creates a chain id from any string-like value.
    #[inline]
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChainId {
    #[inline]
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

// ============================================================================
// Tests
// ============================================================================
