//! `WalletStore`: the in-memory history index built from wallet exports.
//!
//! Wallets are loaded once from `--wallet-dir` directories (or imported
//! from strings in tests) and never mutated afterwards, so the store is
//! shared read-only behind an `Arc`.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::CoreError;
use crate::types::AccountRecords;

use super::dir::walk_wallet_dir;
use super::jsonl::parse_wallet_jsonl;
use super::types::{WalletFile, WalletStoreError, WalletSummary};
use super::HistoryIndex;

#[derive(Default)]
pub struct WalletStore {
    wallets: Vec<WalletFile>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.jsonl` export under `dir`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), CoreError> {
        if !dir.is_dir() {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("wallet directory not found: {}", dir.display()),
            )));
        }

        let mut seen_ids: HashSet<String> = self.wallets.iter().map(|w| w.id.clone()).collect();
        walk_wallet_dir(dir, dir, &mut self.wallets, &mut seen_ids)
    }

    /// Add a wallet from export content under the given name.
    pub fn import(&mut self, name: &str, content: &str) -> Result<(), WalletStoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletStoreError::EmptyWalletName);
        }
        if self.find(name).is_some() {
            return Err(WalletStoreError::DuplicateWallet(name.to_owned()));
        }

        let accounts = parse_wallet_jsonl(content)?;
        self.wallets.push(WalletFile {
            id: name.to_owned(),
            accounts,
        });
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&WalletFile> {
        self.wallets.iter().find(|w| w.id == name)
    }
}

impl HistoryIndex for WalletStore {
    fn wallets(&self) -> Vec<WalletSummary> {
        self.wallets
            .iter()
            .map(|w| WalletSummary {
                name: w.id.clone(),
                account_count: w.account_count(),
                movement_count: w.movement_count(),
            })
            .collect()
    }

    fn get_history_filter(
        &self,
        wallet_name: &str,
        address: Option<&str>,
        account_name: Option<&str>,
        from_date: Option<u64>,
    ) -> Result<Vec<AccountRecords>, WalletStoreError> {
        let wallet = self
            .find(wallet_name)
            .ok_or_else(|| WalletStoreError::WalletNotFound(wallet_name.to_owned()))?;

        // Address scoping happens during classification, where the
        // transaction contents are known.
        if let Some(address) = address {
            debug!(wallet = wallet_name, address, "address filter deferred to classification");
        }

        let selected: Vec<&AccountRecords> = match account_name {
            None => wallet.accounts.iter().collect(),
            Some(name) => {
                let account = wallet
                    .accounts
                    .iter()
                    .find(|a| a.account.name == name)
                    .ok_or_else(|| WalletStoreError::AccountNotFound {
                        wallet: wallet_name.to_owned(),
                        account: name.to_owned(),
                    })?;
                vec![account]
            }
        };

        Ok(selected
            .into_iter()
            .map(|records| AccountRecords {
                account: records.account.clone(),
                entries: records
                    .entries
                    .iter()
                    .filter(|e| from_date.is_none_or(|from| e.created_at >= from))
                    .cloned()
                    .collect(),
            })
            .collect())
    }
}
