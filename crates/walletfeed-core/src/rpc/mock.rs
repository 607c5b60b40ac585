use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::error::{CoreError, RpcError};
use crate::types::ResolvedTx;

use super::types::ChainInfo;
use super::TxRepository;

/// A mock transaction repository for testing. Returns canned transactions
/// from a `HashMap` populated via the builder pattern, and counts lookups so
/// tests can assert on cache behaviour.
pub struct MockRepository {
    transactions: HashMap<Txid, ResolvedTx>,
    chain_info: ChainInfo,
    transport_failure: bool,
    lookups: AtomicUsize,
}

impl MockRepository {
    pub fn builder() -> MockRepositoryBuilder {
        MockRepositoryBuilder {
            transactions: HashMap::new(),
            chain_info: ChainInfo {
                chain: "regtest".into(),
                blocks: 100,
                best_block_hash: BlockHash::all_zeros(),
                pruned: false,
            },
            transport_failure: false,
        }
    }

    /// Number of `get_transaction` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

pub struct MockRepositoryBuilder {
    transactions: HashMap<Txid, ResolvedTx>,
    chain_info: ChainInfo,
    transport_failure: bool,
}

impl MockRepositoryBuilder {
    pub fn with_tx(mut self, tx: ResolvedTx) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    pub fn with_chain_info(mut self, info: ChainInfo) -> Self {
        self.chain_info = info;
        self
    }

    /// Make every lookup fail as if the node were unreachable.
    pub fn failing_transport(mut self) -> Self {
        self.transport_failure = true;
        self
    }

    pub fn build(self) -> MockRepository {
        MockRepository {
            transactions: self.transactions,
            chain_info: self.chain_info,
            transport_failure: self.transport_failure,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TxRepository for MockRepository {
    async fn get_transaction(&self, txid: &Txid) -> Result<ResolvedTx, CoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.transport_failure {
            return Err(RpcError::InvalidResponse("connection refused".into()).into());
        }
        self.transactions
            .get(txid)
            .cloned()
            .ok_or(CoreError::TxNotFound(*txid))
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        Ok(self.chain_info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[tokio::test]
    async fn with_chain_info_overrides_defaults() {
        let custom_info = ChainInfo {
            chain: "main".into(),
            blocks: 800_000,
            best_block_hash: BlockHash::all_zeros(),
            pruned: true,
        };
        let repo = MockRepository::builder()
            .with_chain_info(custom_info)
            .build();
        let info = repo.get_blockchain_info().await.unwrap();
        assert_eq!(info.chain, "main");
        assert_eq!(info.blocks, 800_000);
        assert!(info.pruned);
    }

    #[tokio::test]
    async fn get_transactions_preserves_order_and_reports_unknown() {
        let a = make_tx(txid_from_byte(1), vec![coinbase_input()], vec![simple_output(5_000)]);
        let b = make_tx(txid_from_byte(2), vec![coinbase_input()], vec![simple_output(3_000)]);
        let repo = MockRepository::builder().with_tx(a).with_tx(b).build();

        let txs = repo
            .get_transactions(&[txid_from_byte(2), txid_from_byte(1)])
            .await
            .unwrap();
        assert_eq!(txs[0].txid, txid_from_byte(2));
        assert_eq!(txs[1].txid, txid_from_byte(1));

        let err = repo.get_transaction(&txid_from_byte(9)).await.unwrap_err();
        assert!(matches!(err, CoreError::TxNotFound(t) if t == txid_from_byte(9)));
        assert_eq!(repo.lookups(), 3);
    }
}
