use bitcoin::Txid;
use quick_cache::sync::Cache as QuickCache;

use crate::types::ResolvedTx;

// ==============================================================================
// Cache
// ==============================================================================

/// Bounded in-memory cache of resolved transactions.
///
/// Shared across requests via `Arc<Cache>`. Only confirmed transactions are
/// admitted: their contents can no longer change, so an entry never needs
/// invalidation. Eviction is handled by `quick_cache`.
pub struct Cache {
    transactions: QuickCache<Txid, ResolvedTx>,
}

impl Cache {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transactions: QuickCache::new(capacity.max(1)),
        }
    }

    pub fn get_tx(&self, txid: &Txid) -> Option<ResolvedTx> {
        self.transactions.get(txid)
    }

    /// Insert `tx` if it is confirmed. Returns whether it was admitted.
    pub fn insert_tx(&self, tx: ResolvedTx) -> bool {
        if tx.block_height.is_none() {
            return false;
        }
        self.transactions.insert(tx.txid, tx);
        true
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
