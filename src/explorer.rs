//! Block explorer links for wallets and transactions.
//!
//! Unknown network names never fail: they resolve to [`Network::default`], so a typo in a
//! log call still produces a usable link.

use paygate_types::network::Network;

/// Resolves a network name, falling back to the default network.
pub fn resolve_network(network: &str) -> Network {
    network.parse().unwrap_or_default()
}

/// URL of the explorer page listing activity of `address`.
pub fn explorer_url(address: &str, network: &str) -> String {
    let host = resolve_network(network).explorer_host();
    format!("https://{host}/address/{address}")
}

/// URL of the explorer page of the transaction `tx_hash`.
pub fn transaction_url(tx_hash: &str, network: &str) -> String {
    let host = resolve_network(network).explorer_host();
    format!("https://{host}/tx/{tx_hash}")
}
