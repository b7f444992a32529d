//! JSON chain list loading.
//!
//! The chain list is a JSON array of [`Chain`] objects. Loading validates
//! that every chain id is non-empty and unique, since the pool keys all of
//! its state by chain id.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{Error, Result};

use super::Chain;

// ============================================================================
// Loading
// ============================================================================

/// Parses and validates a JSON chain list.
///
/// # Errors
///
/// - [`Error::Json`] if the document is not a valid chain list
/// - [`Error::Config`] if a chain id is empty or duplicated
pub fn load_chains(json: &str) -> Result<Vec<Chain>> {
    let chains: Vec<Chain> = serde_json::from_str(json)?;
    validate(&chains)?;

    debug!(count = chains.len(), "Chain list loaded");
    Ok(chains)
}

/// Reads a JSON chain list from disk.
///
/// # Errors
///
/// - [`Error::Io`] if the file cannot be read
/// - Any error from [`load_chains`]
pub fn load_chains_from_path(path: impl AsRef<Path>) -> Result<Vec<Chain>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_chains(&contents)
}

// ============================================================================
// Validation
// ============================================================================

fn validate(chains: &[Chain]) -> Result<()> {
    let mut seen = FxHashSet::default();

    for chain in chains {
        if chain.chain_id.is_empty() {
            return Err(Error::config(format!(
                "Chain '{}' has an empty chainId",
                chain.name
            )));
        }

        if !seen.insert(chain.chain_id.clone()) {
            return Err(Error::config(format!(
                "Duplicate chainId: {}",
                chain.chain_id
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
