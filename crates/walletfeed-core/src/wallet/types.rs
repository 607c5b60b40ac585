//! Wallet export line types, loaded wallet definitions, and store errors.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{AccountMeta, AccountRecords, FlatHistoryEntry};

// ==============================================================================
// Export Lines
// ==============================================================================

/// One line of a wallet export, tagged by `"record"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "lowercase")]
pub enum WalletLine {
    Account(AccountMeta),
    Movement(MovementLine),
}

/// A movement line: the account it belongs to plus the flat entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementLine {
    pub account: String,
    #[serde(flatten)]
    pub entry: FlatHistoryEntry,
}

// ==============================================================================
// Loaded Wallets
// ==============================================================================

/// A loaded wallet: its accounts in declaration order, each holding its
/// movements in file order.
#[derive(Debug, Clone)]
pub struct WalletFile {
    pub id: String,
    pub(super) accounts: Vec<AccountRecords>,
}

impl WalletFile {
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn movement_count(&self) -> usize {
        self.accounts.iter().map(|a| a.entries.len()).sum()
    }
}

/// Listing entry for `GET /wallets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub name: String,
    pub account_count: usize,
    pub movement_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletStoreError {
    #[error("wallet name cannot be empty")]
    EmptyWalletName,

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("account `{account}` not found in wallet `{wallet}`")]
    AccountNotFound { wallet: String, account: String },

    #[error("wallet already loaded: {0}")]
    DuplicateWallet(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
