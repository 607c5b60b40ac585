//! Response model for the history feed and the assembly stage that builds
//! it from per-account classification results.
//!
//! Field names are camelCase and optional or empty fields are omitted, so
//! the JSON matches what wallet front-ends consume. All amounts are integer
//! satoshis; timestamps are unix seconds.

use bitcoin::hex::DisplayHex;
use bitcoin::{Address, Amount, Script, SignedAmount, Txid};
use serde::Serialize;

use crate::history::{AccountClassification, EntryWarning};
use crate::types::{BlockHeight, SentPayment, TxInput, TxOutput};

// ==============================================================================
// History Items
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Send,
    Received,
    Staked,
}

/// One entry of an account's history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputDetail>,
    /// Null-data outputs of the transaction, with their output index.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<NullDataOutput>,
    pub id: Txid,
    /// Signed because a staking reward can be negative when the stake is
    /// larger than what came back.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<SentPayment>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "bitcoin::amount::serde::as_sat::opt"
    )]
    pub fee: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_in_block: Option<BlockHeight>,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u32>,
}

/// Hex and asm renderings of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptView {
    pub asm: String,
    pub hex: String,
}

impl ScriptView {
    pub fn new(script: &Script) -> Self {
        Self {
            asm: script.to_asm_string(),
            hex: script.to_hex_string(),
        }
    }
}

/// A transaction input together with the address it was attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDetail {
    /// Coinbase data, for the single input of a coinbase transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<Txid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<ScriptView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub txinwitness: Vec<String>,
    pub sequence: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl InputDetail {
    pub fn new(input: &TxInput, address: Option<&Address>) -> Self {
        let (coinbase, script_sig) = match input.prevout {
            None => (Some(input.script_sig.to_hex_string()), None),
            Some(_) => (None, Some(ScriptView::new(&input.script_sig))),
        };
        Self {
            coinbase,
            txid: input.prevout.map(|p| p.txid),
            vout: input.prevout.map(|p| p.vout),
            script_sig,
            txinwitness: input
                .witness
                .iter()
                .map(|item| item.to_lower_hex_string())
                .collect(),
            sequence: input.sequence,
            address: address.map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NullDataOutput {
    pub n: u32,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub value: Amount,
    pub script_pub_key: OutputScriptView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputScriptView {
    pub asm: String,
    pub hex: String,
    #[serde(rename = "type")]
    pub script_type: String,
}

impl NullDataOutput {
    pub fn new(n: u32, output: &TxOutput) -> Self {
        let view = ScriptView::new(&output.script_pub_key);
        Self {
            n,
            value: output.value,
            script_pub_key: OutputScriptView {
                asm: view.asm,
                hex: view.hex,
                script_type: output.script_type.to_string(),
            },
        }
    }
}

// ==============================================================================
// Response Model
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistoryModel {
    pub account_name: String,
    pub account_hd_path: String,
    pub coin_type: u32,
    pub transactions_history: Vec<ClassifiedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletHistoryModel {
    pub history: Vec<AccountHistoryModel>,
    /// Entries left out because their transaction could not be resolved.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<EntryWarning>,
    /// Set when the pass stopped early at its deadline.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Group classified items per account, attaching account metadata and the
/// network's coin type. Account order is preserved.
pub fn assemble(classified: Vec<AccountClassification>, coin_type: u32) -> WalletHistoryModel {
    let mut skipped = Vec::new();
    let mut truncated = false;

    let history = classified
        .into_iter()
        .map(|account| {
            skipped.extend(account.warnings);
            truncated |= account.truncated;
            AccountHistoryModel {
                account_name: account.account.name,
                account_hd_path: account.account.hd_path,
                coin_type,
                transactions_history: account.items,
            }
        })
        .collect();

    WalletHistoryModel {
        history,
        skipped,
        truncated,
    }
}
