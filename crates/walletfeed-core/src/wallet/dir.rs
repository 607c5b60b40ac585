//! Directory walking: recursively discovers and loads `.jsonl` wallet
//! exports from a directory tree.

use std::collections::HashSet;
use std::path::Path;

use crate::error::CoreError;

use super::jsonl::parse_wallet_jsonl;
use super::types::WalletFile;

/// Recursively walk `current`, loading every `.jsonl` file as a wallet.
/// `base` is the configured directory root; `seen_ids` spans every
/// directory loaded so far so collisions across roots are detected.
pub(super) fn walk_wallet_dir(
    base: &Path,
    current: &Path,
    wallets: &mut Vec<WalletFile>,
    seen_ids: &mut HashSet<String>,
) -> Result<(), CoreError> {
    // Sorted for a deterministic load order across filesystems.
    let mut entries: Vec<_> = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.path());

    entries.into_iter().try_for_each(|entry| {
        let path = entry.path();
        if path.is_dir() {
            return walk_wallet_dir(base, &path, wallets, seen_ids);
        }
        if path.extension().is_none_or(|ext| ext != "jsonl") {
            return Ok(());
        }
        load_wallet_file(base, &path, wallets, seen_ids)
    })
}

/// The wallet id is the path relative to `base` without `.jsonl`, with `\`
/// normalized to `/`.
fn load_wallet_file(
    base: &Path,
    path: &Path,
    wallets: &mut Vec<WalletFile>,
    seen_ids: &mut HashSet<String>,
) -> Result<(), CoreError> {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let id = relative
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/");
    if id.is_empty() {
        return Ok(());
    }

    if !seen_ids.insert(id.clone()) {
        return Err(CoreError::WalletParse {
            line: 0,
            message: format!("duplicate wallet id `{id}` from {}", path.display()),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let accounts = parse_wallet_jsonl(&content).map_err(|err| match err {
        CoreError::WalletParse { line, message } => CoreError::WalletParse {
            line,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })?;

    tracing::debug!(wallet = %id, accounts = accounts.len(), "loaded wallet export");
    wallets.push(WalletFile { id, accounts });
    Ok(())
}
