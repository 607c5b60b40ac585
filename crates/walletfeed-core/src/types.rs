//! Domain types for walletfeed's history model.
//!
//! Contains the resolved transaction types (`ResolvedTx`, `TxInput`,
//! `TxOutput`), the wallet-side movement records handed over by a
//! [`HistoryIndex`](crate::wallet::HistoryIndex) (`FlatHistoryEntry`,
//! `Direction`, `AccountRecords`), and shared newtypes like `BlockHeight`.

use bitcoin::{Amount, BlockHash, Network, OutPoint, ScriptBuf, Txid, Witness};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Script Type Classification
// ==============================================================================

/// Classifies a locking script. Detection is delegated to the `bitcoin`
/// crate's `Script::is_p2pkh()`, `is_p2sh()`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    P2pk,
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    BareMultisig,
    NullData,
    Unknown,
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P2pk => write!(f, "pubkey"),
            Self::P2pkh => write!(f, "pubkeyhash"),
            Self::P2sh => write!(f, "scripthash"),
            Self::P2wpkh => write!(f, "witness_v0_keyhash"),
            Self::P2wsh => write!(f, "witness_v0_scripthash"),
            Self::P2tr => write!(f, "witness_v1_taproot"),
            Self::BareMultisig => write!(f, "multisig"),
            Self::NullData => write!(f, "nulldata"),
            Self::Unknown => write!(f, "nonstandard"),
        }
    }
}

// ==============================================================================
// Block Height
// ==============================================================================

/// A block height, wrapped for type safety.
///
/// `#[serde(transparent)]` keeps the JSON representation a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Chain Parameters
// ==============================================================================

/// Network parameters handed explicitly to every classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    pub network: Network,
    /// SLIP-44 coin type reported next to each account.
    pub coin_type: u32,
}

impl ChainParams {
    /// Parameters with the SLIP-44 coin type of `network`: 0 on mainnet,
    /// 1 on every test network.
    pub fn new(network: Network) -> Self {
        let coin_type = match network {
            Network::Bitcoin => 0,
            _ => 1,
        };
        Self { network, coin_type }
    }

    pub fn with_coin_type(mut self, coin_type: u32) -> Self {
        self.coin_type = coin_type;
        self
    }
}

// ==============================================================================
// Transaction Types
// ==============================================================================

/// A fully resolved transaction as returned by a
/// [`TxRepository`](crate::rpc::TxRepository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTx {
    pub txid: Txid,
    pub version: i32,
    pub locktime: u32,
    pub block_hash: Option<BlockHash>,
    /// Block height; `None` for unconfirmed (mempool) transactions.
    pub block_height: Option<BlockHeight>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl ResolvedTx {
    /// Empty stand-in used for movements that have no confirmation height.
    /// It has no inputs and no outputs, so every per-input and per-output
    /// scan over it is vacuous.
    pub fn placeholder(txid: Txid) -> Self {
        Self {
            txid,
            version: 1,
            locktime: 0,
            block_hash: None,
            block_height: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// A coinbase transaction has exactly one input whose prevout is `None`.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_none()
    }

    /// Proof-of-stake coinstake marker: a non-coinbase transaction with at
    /// least two outputs whose first output is empty (zero value, empty
    /// script).
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.is_coinbase()
            && self.outputs.len() >= 2
            && self.outputs[0].value == Amount::ZERO
            && self.outputs[0].script_pub_key.is_empty()
    }
}

/// A transaction input. For coinbase inputs, `prevout` is `None` and
/// `script_sig` carries the coinbase data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: Option<OutPoint>,
    pub script_sig: ScriptBuf,
    pub witness: Witness,
    pub sequence: u32,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub value: Amount,
    pub script_pub_key: ScriptBuf,
    pub script_type: ScriptType,
}

// ==============================================================================
// Wallet Movement Records
// ==============================================================================

/// Account metadata reported by the history index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    pub name: String,
    pub hd_path: String,
}

/// One account and its movement records, in index order.
#[derive(Debug, Clone)]
pub struct AccountRecords {
    pub account: AccountMeta,
    pub entries: Vec<FlatHistoryEntry>,
}

/// A single payment recorded on the sending side of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentPayment {
    pub destination_address: String,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    pub pay_to_self: bool,
}

/// Which side of a transaction the wallet was on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Direction {
    /// Value left the wallet in spending transaction `txid`.
    Sent {
        txid: Txid,
        #[serde(default)]
        payments: Vec<SentPayment>,
    },
    /// Value arrived at the wallet in output `txid:vout`.
    Received { txid: Txid, vout: u32 },
}

/// An immutable snapshot of one owned-value movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatHistoryEntry {
    #[serde(flatten)]
    pub direction: Direction,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    /// The wallet address that owns this movement.
    pub address: String,
    /// HD derivation path of `address`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_path: Option<String>,
    /// Creation time, unix seconds.
    pub created_at: u64,
    /// Confirmation height; absent for unconfirmed movements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<BlockHeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u32>,
    /// Coinstake marker; absent means "not a coinstake".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinstake: Option<bool>,
}

impl FlatHistoryEntry {
    /// The counterparty transaction id: the spending transaction for sends,
    /// the funding transaction for receives.
    pub fn txid(&self) -> Txid {
        match &self.direction {
            Direction::Sent { txid, .. } | Direction::Received { txid, .. } => *txid,
        }
    }

    pub fn is_coinstake(&self) -> bool {
        self.coinstake.unwrap_or(false)
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    /// Whether the owning address sits on the internal (change) branch of
    /// its account.
    pub fn is_change_address(&self) -> bool {
        self.hd_path.as_deref().is_some_and(is_change_path)
    }
}

/// An HD path `m/purpose'/coin'/account'/change/index` is a change path when
/// its change component is `1`.
pub fn is_change_path(hd_path: &str) -> bool {
    hd_path
        .split('/')
        .nth(4)
        .map(|segment| segment.trim_end_matches(['\'', 'h']))
        .and_then(|segment| segment.parse::<u32>().ok())
        == Some(1)
}
