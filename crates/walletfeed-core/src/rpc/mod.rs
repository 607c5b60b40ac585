//! Transaction repository abstraction.
//!
//! Defines the [`TxRepository`] trait and provides an HTTP JSON-RPC
//! implementation ([`HttpRpcClient`]) plus a test mock
//! (`mock::MockRepository`).

mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use http_adapter::HttpRpcClient;
pub use types::ChainInfo;

use async_trait::async_trait;
use bitcoin::Txid;

use crate::error::CoreError;
use crate::types::ResolvedTx;

/// Read access to full transactions of a Bitcoin-compatible node.
///
/// Implementations handle authentication, connection management, and
/// response decoding internally. Unknown txids are reported as
/// [`CoreError::TxNotFound`].
#[async_trait]
pub trait TxRepository: Send + Sync {
    /// Fetch a decoded transaction by txid.
    async fn get_transaction(&self, txid: &Txid) -> Result<ResolvedTx, CoreError>;

    /// Fetch many decoded transactions efficiently. Implementations may batch
    /// these requests into one or more RPC calls.
    async fn get_transactions(&self, txids: &[Txid]) -> Result<Vec<ResolvedTx>, CoreError> {
        let mut results = Vec::with_capacity(txids.len());
        for txid in txids {
            results.push(self.get_transaction(txid).await?);
        }
        Ok(results)
    }

    /// Fetch basic chain info (network, block count, pruning status).
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError>;
}
