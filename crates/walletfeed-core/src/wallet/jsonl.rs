//! JSONL parsing for wallet exports.

use crate::error::CoreError;
use crate::types::AccountRecords;

use super::types::WalletLine;

/// Parse a wallet export into its accounts, skipping empty lines.
///
/// Movements must follow the declaration of their account. A repeated
/// account declaration is an error, since merging would reorder
/// movements.
pub(super) fn parse_wallet_jsonl(content: &str) -> Result<Vec<AccountRecords>, CoreError> {
    content
        .lines()
        .enumerate()
        .try_fold(Vec::<AccountRecords>::new(), |mut accounts, (line_num, line)| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(accounts);
            }
            let parse_error = |message: String| CoreError::WalletParse {
                line: line_num + 1,
                message,
            };

            let record: WalletLine =
                serde_json::from_str(line).map_err(|e| parse_error(e.to_string()))?;
            match record {
                WalletLine::Account(meta) => {
                    if accounts.iter().any(|a| a.account.name == meta.name) {
                        return Err(parse_error(format!(
                            "account `{}` declared twice",
                            meta.name
                        )));
                    }
                    accounts.push(AccountRecords {
                        account: meta,
                        entries: Vec::new(),
                    });
                }
                WalletLine::Movement(movement) => {
                    let account = accounts
                        .iter_mut()
                        .find(|a| a.account.name == movement.account)
                        .ok_or_else(|| {
                            parse_error(format!(
                                "movement references undeclared account `{}`",
                                movement.account
                            ))
                        })?;
                    account.entries.push(movement.entry);
                }
            }
            Ok(accounts)
        })
}
