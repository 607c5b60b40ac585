use bitcoin::Txid;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::cache::Cache;
use crate::error::CoreError;
use crate::rpc::TxRepository;
use crate::types::ResolvedTx;

// ==============================================================================
// Transaction Resolver
// ==============================================================================

/// Cache-first transaction lookups with a bound on in-flight repository
/// calls.
///
/// One resolver is built per classification pass; the cache it fronts is
/// shared across passes.
pub struct TxResolver<'a> {
    repo: &'a dyn TxRepository,
    cache: &'a Cache,
    permits: Semaphore,
}

impl<'a> TxResolver<'a> {
    pub fn new(repo: &'a dyn TxRepository, cache: &'a Cache, concurrency: usize) -> Self {
        Self {
            repo,
            cache,
            permits: Semaphore::new(concurrency.max(1)),
        }
    }

    pub async fn fetch(&self, txid: &Txid) -> Result<ResolvedTx, CoreError> {
        if let Some(cached) = self.cache.get_tx(txid) {
            return Ok(cached);
        }

        // The semaphore is never closed, so acquisition only fails if that
        // changes; proceed unbounded rather than fail the lookup.
        let _permit = self.permits.acquire().await.ok();

        // Another task may have populated the cache while we waited.
        if let Some(cached) = self.cache.get_tx(txid) {
            return Ok(cached);
        }

        let tx = self.repo.get_transaction(txid).await?;
        self.cache.insert_tx(tx.clone());
        Ok(tx)
    }

    /// Warm the cache for `txids` with a single batched lookup. Failures
    /// are not reported here: the per-transaction `fetch` that follows
    /// surfaces them with the right txid.
    pub async fn prefetch(&self, txids: &[Txid]) {
        let missing: Vec<Txid> = txids
            .iter()
            .filter(|txid| self.cache.get_tx(txid).is_none())
            .copied()
            .collect();
        if missing.len() < 2 {
            return;
        }

        let _permit = self.permits.acquire().await.ok();
        match self.repo.get_transactions(&missing).await {
            Ok(txs) => {
                for tx in txs {
                    self.cache.insert_tx(tx);
                }
            }
            Err(err) => {
                debug!(count = missing.len(), error = %err, "batch prefetch failed");
            }
        }
    }
}
