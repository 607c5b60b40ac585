//! Wallet history index.
//!
//! Provides the [`HistoryIndex`] trait the classification pass reads
//! movements from, and [`WalletStore`], an implementation backed by JSONL
//! wallet exports loaded from directories.

mod dir;
mod jsonl;
mod store;
mod types;

pub use store::WalletStore;
pub use types::{MovementLine, WalletFile, WalletLine, WalletStoreError, WalletSummary};

use crate::types::AccountRecords;

/// Source of per-account movement records.
pub trait HistoryIndex: Send + Sync {
    /// Wallets known to the index.
    fn wallets(&self) -> Vec<WalletSummary>;

    /// Accounts of `wallet_name` with their movements, in index order.
    ///
    /// `account_name` restricts the result to one account and `from_date`
    /// (unix seconds) drops movements created earlier. `address` is
    /// advisory: implementations may use it to narrow the result, and the
    /// classification pass applies exact address scoping regardless.
    fn get_history_filter(
        &self,
        wallet_name: &str,
        address: Option<&str>,
        account_name: Option<&str>,
        from_date: Option<u64>,
    ) -> Result<Vec<AccountRecords>, WalletStoreError>;
}
