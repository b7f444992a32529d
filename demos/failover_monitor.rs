//! Connection pool failover walk-through.
//!
//! Demonstrates:
//! - Loading chains from JSON
//! - Observing connection states through a pool delegate
//! - Failing over to the next node when a request fails
//!
//! Usage:
//!   cargo run --example failover_monitor --features native-tls
//!   cargo run --example failover_monitor --features native-tls -- chains.json
//!   cargo run --example failover_monitor --features native-tls -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chain_connect::{
    Chain, ConnectionPool, ConnectionPoolDelegate, ConnectionState, EngineOptions, load_chains,
    load_chains_from_path,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_CHAINS: &str = r#"[
    {
        "chainId": "polkadot",
        "name": "Polkadot",
        "nodes": [
            { "url": "wss://127.0.0.1:1", "name": "Unreachable" },
            { "url": "wss://rpc.polkadot.io", "name": "Parity" }
        ]
    }
]"#;

const MAX_ATTEMPTS: usize = 4;

// ============================================================================
// Delegate
// ============================================================================

struct StatePrinter;

impl ConnectionPoolDelegate for StatePrinter {
    fn web_socket_did_change_state(&self, url: &Url, state: ConnectionState) {
        println!("        {url} -> {state}");
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|arg| arg == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== Failover Monitor ===\n");

    let chains = match std::env::args().skip(1).find(|arg| !arg.starts_with("--")) {
        Some(path) => load_chains_from_path(&path).with_context(|| format!("loading {path}"))?,
        None => load_chains(DEFAULT_CHAINS)?,
    };

    let options = EngineOptions::new().with_request_timeout(Duration::from_secs(5));
    let pool = ConnectionPool::with_options(options);

    let printer: Arc<dyn ConnectionPoolDelegate> = Arc::new(StatePrinter);
    pool.set_delegate(Arc::downgrade(&printer));

    for chain in &chains {
        query_chain(&pool, chain).await?;
    }

    println!("\n=== Done ===");
    Ok(())
}

async fn query_chain(pool: &ConnectionPool, chain: &Chain) -> anyhow::Result<()> {
    println!("[{}] Connecting...", chain.name);

    let mut connection = pool.setup_connection(chain)?;

    for attempt in 1..=MAX_ATTEMPTS {
        match connection.request("system_chain", json!([])).await {
            Ok(name) => {
                println!("        ✓ {} answered from {}: {name}", chain.name, connection.url());
                return Ok(());
            }
            Err(e) => {
                println!("        ✗ attempt {attempt} on {} failed: {e}", connection.url());
                let failed = connection.url();
                connection = pool.setup_connection_ignoring(chain, Some(&failed))?;
            }
        }
    }

    anyhow::bail!("{} unreachable after {MAX_ATTEMPTS} attempts", chain.name)
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "chain_connect=debug"
    } else {
        "chain_connect=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
