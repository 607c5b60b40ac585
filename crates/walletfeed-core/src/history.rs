//! History classification: turns an account's movement records into
//! typed feed items.
//!
//! Each record is resolved to its transaction, classified as a send,
//! receive, or staking reward, filtered by the self-payment, change, and
//! coinstake rules, and optionally scoped to a single address. Accounts are
//! classified concurrently; within an account, records are pipelined but
//! results always come back in record order.

use std::pin::pin;

use bitcoin::{Address, Amount, SignedAmount, Txid};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::attribution::attribute_input;
use crate::cache::Cache;
use crate::error::{AttributionError, CoreError};
use crate::model::{ClassifiedItem, InputDetail, ItemType, NullDataOutput};
use crate::resolve::TxResolver;
use crate::rpc::TxRepository;
use crate::script::{decode_destination, is_null_data, is_unspendable};
use crate::types::{
    AccountMeta, AccountRecords, ChainParams, Direction, FlatHistoryEntry, ResolvedTx, SentPayment,
};

// ==============================================================================
// Options and Results
// ==============================================================================

/// Tuning for one classification pass.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Records resolved ahead of the consumer per account, and the bound on
    /// in-flight repository calls.
    pub concurrency: usize,
    /// Stop consuming records once reached. Records completed before the
    /// deadline are kept and the account is marked truncated.
    pub deadline: Option<Instant>,
    /// Look up unconfirmed transactions in the mempool instead of using an
    /// empty placeholder.
    pub resolve_unconfirmed: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            deadline: None,
            resolve_unconfirmed: false,
        }
    }
}

/// A record left out of the feed because its transaction could not be
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryWarning {
    pub account: String,
    pub id: Txid,
    pub reason: String,
}

/// The classified feed of one account.
#[derive(Debug, Clone)]
pub struct AccountClassification {
    pub account: AccountMeta,
    pub items: Vec<ClassifiedItem>,
    pub warnings: Vec<EntryWarning>,
    pub truncated: bool,
}

enum Outcome {
    Keep(ClassifiedItem),
    Drop(&'static str),
    Skip(String),
}

// ==============================================================================
// Classification Pass
// ==============================================================================

/// Classify every account's records.
///
/// `filter` scopes the feed to items whose transaction pays to it (sends)
/// or spends from it (receives). Lookup failures skip the affected record
/// with a warning; a repository transport failure aborts the pass.
pub async fn build_history(
    accounts: Vec<AccountRecords>,
    repo: &dyn TxRepository,
    cache: &Cache,
    params: ChainParams,
    filter: Option<&Address>,
    options: &BuildOptions,
) -> Result<Vec<AccountClassification>, CoreError> {
    let resolver = TxResolver::new(repo, cache, options.concurrency);
    let classifier = Classifier {
        resolver: &resolver,
        params,
        filter,
        options,
    };

    join_all(
        accounts
            .into_iter()
            .map(|records| classifier.classify_account(records)),
    )
    .await
    .into_iter()
    .collect()
}

struct Classifier<'a> {
    resolver: &'a TxResolver<'a>,
    params: ChainParams,
    filter: Option<&'a Address>,
    options: &'a BuildOptions,
}

impl Classifier<'_> {
    async fn classify_account(
        &self,
        records: AccountRecords,
    ) -> Result<AccountClassification, CoreError> {
        let AccountRecords { account, entries } = records;

        // Only confirmed transactions are cached, so only they are worth
        // batching.
        let lookups: Vec<Txid> = entries
            .iter()
            .filter(|e| e.is_confirmed() && self.early_drop(e).is_none())
            .map(FlatHistoryEntry::txid)
            .collect();
        self.warm_cache(&account.name, &lookups).await;

        let pending: Vec<_> = entries.iter().map(|entry| self.classify_entry(entry)).collect();
        let mut outcomes = pin!(stream::iter(pending).buffered(self.options.concurrency.max(1)));

        let mut items = Vec::new();
        let mut warnings = Vec::new();
        let mut truncated = false;

        for entry in &entries {
            let next = match self.options.deadline {
                None => outcomes.next().await,
                Some(deadline) if Instant::now() >= deadline => None,
                Some(deadline) => tokio::time::timeout_at(deadline, outcomes.next())
                    .await
                    .ok()
                    .flatten(),
            };
            let Some(outcome) = next else {
                truncated = true;
                warn!(
                    account = %account.name,
                    completed = items.len(),
                    total = entries.len(),
                    "history deadline reached; returning partial feed"
                );
                break;
            };

            match outcome? {
                Outcome::Keep(item) => items.push(item),
                Outcome::Drop(reason) => {
                    debug!(account = %account.name, txid = %entry.txid(), reason, "entry dropped");
                }
                Outcome::Skip(reason) => {
                    warn!(account = %account.name, txid = %entry.txid(), %reason, "entry skipped");
                    warnings.push(EntryWarning {
                        account: account.name.clone(),
                        id: entry.txid(),
                        reason,
                    });
                }
            }
        }

        Ok(AccountClassification {
            account,
            items,
            warnings,
            truncated,
        })
    }

    /// Batch-load `txids` into the cache. Under a deadline the batch gets at
    /// most half of the remaining budget; the rest is left for per-entry
    /// lookups so an abandoned batch still leaves time to make progress.
    async fn warm_cache(&self, account: &str, txids: &[Txid]) {
        let Some(deadline) = self.options.deadline else {
            self.resolver.prefetch(txids).await;
            return;
        };

        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let cutoff = now + (deadline - now) / 2;
        if tokio::time::timeout_at(cutoff, self.resolver.prefetch(txids))
            .await
            .is_err()
        {
            debug!(account, count = txids.len(), "batch prefetch abandoned at half budget");
        }
    }

    fn needs_lookup(&self, entry: &FlatHistoryEntry) -> bool {
        entry.is_confirmed() || self.options.resolve_unconfirmed
    }

    /// Rules that depend only on the record. Records they drop are never
    /// looked up.
    fn early_drop(&self, entry: &FlatHistoryEntry) -> Option<&'static str> {
        match &entry.direction {
            Direction::Sent { .. } if entry.is_coinstake() => self
                .filter
                .is_some()
                .then_some("staking entry outside address filter"),
            Direction::Sent { payments, .. } if payments.iter().all(|p| p.pay_to_self) => {
                Some("all payments to self")
            }
            Direction::Received { .. } if entry.is_change_address() => {
                Some("received on change address")
            }
            Direction::Received { .. } if entry.is_coinstake() => Some("coinstake output"),
            _ => None,
        }
    }

    async fn classify_entry(&self, entry: &FlatHistoryEntry) -> Result<Outcome, CoreError> {
        if let Some(reason) = self.early_drop(entry) {
            return Ok(Outcome::Drop(reason));
        }

        let tx = match self.resolve(entry).await? {
            Ok(tx) => tx,
            Err(reason) => return Ok(Outcome::Skip(reason)),
        };

        if let Direction::Sent { payments, .. } = &entry.direction {
            if entry.is_coinstake() {
                let Some(amount) = staking_reward(payments, entry.amount) else {
                    return Ok(Outcome::Skip("staking amounts out of range".to_owned()));
                };
                return Ok(Outcome::Keep(self.item(entry, &tx, ItemType::Staked, amount)));
            }
        }

        let attributed = self.attribute_inputs(&tx).await;

        let (item_type, amount, payments, matched) = match &entry.direction {
            Direction::Sent { payments, .. } => {
                let payments: Vec<SentPayment> =
                    payments.iter().filter(|p| !p.pay_to_self).cloned().collect();
                let Some(amount) = sum_payments(&payments).and_then(|a| a.to_signed().ok()) else {
                    return Ok(Outcome::Skip("payment amounts out of range".to_owned()));
                };
                (ItemType::Send, amount, payments, self.pays_to_filter(&tx))
            }
            Direction::Received { .. } => {
                let Ok(amount) = entry.amount.to_signed() else {
                    return Ok(Outcome::Skip("amount out of range".to_owned()));
                };
                let payment = SentPayment {
                    destination_address: entry.address.clone(),
                    amount: entry.amount,
                    pay_to_self: true,
                };
                let matched = self
                    .filter
                    .is_some_and(|f| attributed.iter().any(|a| a.as_ref() == Some(f)));
                (ItemType::Received, amount, vec![payment], matched)
            }
        };

        if self.filter.is_some() && !matched {
            return Ok(Outcome::Drop("no match for address filter"));
        }

        let mut item = self.item(entry, &tx, item_type, amount);
        item.payments = payments;
        item.inputs = tx
            .inputs
            .iter()
            .zip(&attributed)
            .map(|(input, address)| InputDetail::new(input, address.as_ref()))
            .collect();
        Ok(Outcome::Keep(item))
    }

    /// The record's transaction. `Ok(Err(reason))` is a lookup failure that
    /// skips only this record; `Err` aborts the pass.
    async fn resolve(
        &self,
        entry: &FlatHistoryEntry,
    ) -> Result<Result<ResolvedTx, String>, CoreError> {
        let txid = entry.txid();
        if !self.needs_lookup(entry) {
            return Ok(Ok(ResolvedTx::placeholder(txid)));
        }

        match self.resolver.fetch(&txid).await {
            Ok(tx) => Ok(Ok(tx)),
            Err(err @ (CoreError::TxNotFound(_) | CoreError::InvalidTxData(_))) => {
                if entry.is_confirmed() {
                    Ok(Err(err.to_string()))
                } else {
                    // Left the mempool since the wallet recorded it.
                    debug!(%txid, error = %err, "unconfirmed lookup failed; using placeholder");
                    Ok(Ok(ResolvedTx::placeholder(txid)))
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Attribute every input, in input order. Failures become `None`.
    async fn attribute_inputs(&self, tx: &ResolvedTx) -> Vec<Option<Address>> {
        let network = self.params.network;
        let results = join_all(
            tx.inputs
                .iter()
                .map(|input| attribute_input(input, network, self.resolver)),
        )
        .await;

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(address) => Some(address),
                Err(AttributionError::PrevTx(err @ CoreError::Rpc(_))) => {
                    warn!(txid = %tx.txid, input = index, error = %err, "input attribution failed");
                    None
                }
                Err(err) => {
                    debug!(txid = %tx.txid, input = index, error = %err, "input not attributed");
                    None
                }
            })
            .collect()
    }

    /// Whether any spendable output of `tx` pays to the filter address.
    fn pays_to_filter(&self, tx: &ResolvedTx) -> bool {
        let Some(filter) = self.filter else {
            return false;
        };
        tx.outputs
            .iter()
            .filter(|o| !is_unspendable(&o.script_pub_key))
            .any(|o| {
                decode_destination(&o.script_pub_key, self.params.network).as_ref() == Some(filter)
            })
    }

    fn item(
        &self,
        entry: &FlatHistoryEntry,
        tx: &ResolvedTx,
        item_type: ItemType,
        amount: SignedAmount,
    ) -> ClassifiedItem {
        ClassifiedItem {
            item_type,
            inputs: Vec::new(),
            outputs: null_data_outputs(tx),
            id: entry.txid(),
            amount,
            payments: Vec::new(),
            fee: None,
            confirmed_in_block: entry.block_height,
            timestamp: entry.created_at,
            block_index: entry.block_index,
        }
    }
}

// ==============================================================================
// Helpers
// ==============================================================================

fn null_data_outputs(tx: &ResolvedTx) -> Vec<NullDataOutput> {
    tx.outputs
        .iter()
        .enumerate()
        .filter(|(_, o)| is_null_data(&o.script_pub_key))
        .map(|(n, o)| NullDataOutput::new(n as u32, o))
        .collect()
}

fn sum_payments(payments: &[SentPayment]) -> Option<Amount> {
    payments
        .iter()
        .try_fold(Amount::ZERO, |acc, p| acc.checked_add(p.amount))
}

/// Everything paid out by a coinstake minus the stake it consumed. Negative
/// when less came back than was staked.
fn staking_reward(payments: &[SentPayment], staked: Amount) -> Option<SignedAmount> {
    let paid = sum_payments(payments)?.to_signed().ok()?;
    paid.checked_sub(staked.to_signed().ok()?)
}
