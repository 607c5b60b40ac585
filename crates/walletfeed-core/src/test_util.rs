//! Shared test helpers for `walletfeed-core` unit tests.
//!
//! Builders for resolved transactions, inputs with realistic unlocking
//! scripts, and wallet movement records, so every module's tests construct
//! dummy data the same way.

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{
    Address, Amount, CompressedPublicKey, Network, OutPoint, PublicKey, ScriptBuf, Txid, Witness,
};

use crate::script::classify_script;
use crate::types::{
    BlockHeight, Direction, FlatHistoryEntry, ResolvedTx, SentPayment, TxInput, TxOutput,
};

pub const NETWORK: Network = Network::Regtest;

/// Compressed encodings of G, 2G and 3G on secp256k1.
const TEST_KEYS: [&str; 3] = [
    "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
    "02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
];

// ==============================================================================
// Txid and Key Helpers
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

/// One of three fixed valid public keys, `n` in `1..=3`.
pub fn pubkey(n: usize) -> PublicKey {
    PublicKey::from_str(TEST_KEYS[n - 1]).expect("test key must parse")
}

pub fn p2pkh_address(n: usize) -> Address {
    Address::p2pkh(pubkey(n).pubkey_hash(), NETWORK)
}

pub fn p2wpkh_address(n: usize) -> Address {
    Address::p2wpkh(&CompressedPublicKey(pubkey(n).inner), NETWORK)
}

/// A 71-byte DER-shaped signature. Never verified, only shape-checked.
pub fn fake_signature() -> Vec<u8> {
    let mut sig = vec![0x30, 0x44];
    sig.extend(std::iter::repeat(0x01).take(68));
    sig.push(0x01);
    sig
}

// ==============================================================================
// Script Builders
// ==============================================================================

/// A script consisting only of the given data pushes.
pub fn push_only_script(pushes: &[Vec<u8>]) -> ScriptBuf {
    pushes
        .iter()
        .fold(Builder::new(), |builder, data| {
            let data = PushBytesBuf::try_from(data.clone()).expect("push fits in a script");
            builder.push_slice(data)
        })
        .into_script()
}

/// `<sig> <pubkey>` unlocking script.
pub fn p2pkh_script_sig(pk: &PublicKey) -> ScriptBuf {
    push_only_script(&[fake_signature(), pk.to_bytes()])
}

// ==============================================================================
// Input Builders
// ==============================================================================

/// A coinbase input (no prevout).
pub fn coinbase_input() -> TxInput {
    TxInput {
        prevout: None,
        script_sig: ScriptBuf::from_bytes(vec![0x01, 0x64]),
        witness: Witness::new(),
        sequence: 0xFFFF_FFFF,
    }
}

/// A spending input referencing `funding_txid:vout` with no recognisable
/// signer, so attribution must go through the previous output.
pub fn spending_input(funding_txid: Txid, vout: u32) -> TxInput {
    TxInput {
        prevout: Some(OutPoint::new(funding_txid, vout)),
        script_sig: ScriptBuf::new(),
        witness: Witness::new(),
        sequence: 0xFFFF_FFFE,
    }
}

/// A P2PKH spend signed by key `n`.
pub fn p2pkh_input(funding_txid: Txid, vout: u32, n: usize) -> TxInput {
    TxInput {
        script_sig: p2pkh_script_sig(&pubkey(n)),
        ..spending_input(funding_txid, vout)
    }
}

/// A native segwit spend with witness `<sig> <pk>`.
pub fn witness_input(pk: &PublicKey) -> TxInput {
    TxInput {
        witness: Witness::from_slice(&[fake_signature(), pk.to_bytes()]),
        ..spending_input(txid_from_byte(0xEE), 0)
    }
}

// ==============================================================================
// Output Builders
// ==============================================================================

/// A minimal valid P2WPKH output with the given satoshi value.
pub fn simple_output(sats: u64) -> TxOutput {
    // OP_0 PUSH20 <20-byte-hash>
    let script_bytes = [
        0x00, 0x14, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
        0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14,
    ];
    output_with_script(ScriptBuf::from_bytes(script_bytes.to_vec()), sats)
}

pub fn output_to(address: &Address, sats: u64) -> TxOutput {
    output_with_script(address.script_pubkey(), sats)
}

/// `OP_RETURN <data>` with zero value.
pub fn null_data_output(data: &[u8]) -> TxOutput {
    let mut script = push_only_script(&[data.to_vec()]).into_bytes();
    script.insert(0, 0x6a);
    output_with_script(ScriptBuf::from_bytes(script), 0)
}

pub fn output_with_script(script_pub_key: ScriptBuf, sats: u64) -> TxOutput {
    TxOutput {
        value: Amount::from_sat(sats),
        script_type: classify_script(&script_pub_key),
        script_pub_key,
    }
}

// ==============================================================================
// Transaction Builders
// ==============================================================================

/// A confirmed transaction at height 100.
pub fn make_tx(txid: Txid, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> ResolvedTx {
    ResolvedTx {
        txid,
        version: 2,
        locktime: 0,
        block_hash: None,
        block_height: Some(BlockHeight(100)),
        inputs,
        outputs,
    }
}

// ==============================================================================
// Movement Builders
// ==============================================================================

pub fn payment(destination: &str, sats: u64, pay_to_self: bool) -> SentPayment {
    SentPayment {
        destination_address: destination.to_owned(),
        amount: Amount::from_sat(sats),
        pay_to_self,
    }
}

/// A confirmed send movement owned by `address`.
pub fn sent_entry(txid: Txid, sats: u64, payments: Vec<SentPayment>, address: &str) -> FlatHistoryEntry {
    FlatHistoryEntry {
        direction: Direction::Sent { txid, payments },
        amount: Amount::from_sat(sats),
        address: address.to_owned(),
        hd_path: Some("m/44'/1'/0'/0/0".to_owned()),
        created_at: 1_700_000_000,
        block_height: Some(BlockHeight(100)),
        block_index: Some(1),
        coinstake: None,
    }
}

/// A confirmed receive movement into `address` on the external branch.
pub fn received_entry(txid: Txid, vout: u32, sats: u64, address: &str) -> FlatHistoryEntry {
    FlatHistoryEntry {
        direction: Direction::Received { txid, vout },
        amount: Amount::from_sat(sats),
        address: address.to_owned(),
        hd_path: Some("m/44'/1'/0'/0/1".to_owned()),
        created_at: 1_700_000_100,
        block_height: Some(BlockHeight(101)),
        block_index: Some(2),
        coinstake: None,
    }
}
