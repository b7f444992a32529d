//! Active account/network settings.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::identifiers::ChainId;

// ============================================================================
// AddressType
// ============================================================================

/// Network an address belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressType {
    /// Chain whose connection serves this address.
    pub chain_id: ChainId,

    /// Address encoding prefix of the network.
    pub prefix: u16,
}

impl AddressType {
    /// Creates an address type.
    #[inline]
    #[must_use]
    pub fn new(chain_id: impl Into<ChainId>, prefix: u16) -> Self {
        Self {
            chain_id: chain_id.into(),
            prefix,
        }
    }
}

// ============================================================================
// WebSocketServiceSettings
// ============================================================================

/// Selected connection and account driving the active connection.
///
/// Replaced wholesale on account or network switch. Equal settings are
/// a no-op for the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketServiceSettings {
    /// Selected connection URL.
    pub url: Url,

    /// Network of the selected account.
    #[serde(default)]
    pub address_type: Option<AddressType>,

    /// Selected account address.
    #[serde(default)]
    pub address: Option<String>,
}

impl WebSocketServiceSettings {
    /// Creates settings with no account selected.
    #[inline]
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            address_type: None,
            address: None,
        }
    }

    /// Sets the account network.
    #[inline]
    #[must_use]
    pub fn with_address_type(mut self, address_type: AddressType) -> Self {
        self.address_type = Some(address_type);
        self
    }

    /// Sets the account address.
    #[inline]
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
