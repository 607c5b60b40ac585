//! RPC-specific types that do not belong to the shared domain model.
//!
//! Decoded transactions are represented directly as [`ResolvedTx`] from
//! `crate::types`; this module only defines structures that are specific to
//! other RPC methods.
//!
//! [`ResolvedTx`]: crate::types::ResolvedTx

use bitcoin::{BlockHash, Network};
use serde::Deserialize;

// ==============================================================================
// Chain Info
// ==============================================================================

/// Basic chain information from `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
    pub pruned: bool,
}

impl ChainInfo {
    /// Map the node's chain name onto a `bitcoin::Network`. Nodes report
    /// `main`, `test`, `testnet4`, `signet` and `regtest`.
    pub fn network(&self) -> Option<Network> {
        match self.chain.as_str() {
            "main" => Some(Network::Bitcoin),
            "test" => Some(Network::Testnet),
            "testnet4" => Some(Network::Testnet4),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }
}
