//! Script inspection: classification, destination decoding, null-data and
//! unspendable detection, and signer recovery from unlocking scripts.
//!
//! Pattern matching is delegated to the `bitcoin` crate wherever it has a
//! detector (`is_p2pkh()`, `is_op_return()`, `Address::from_script`). Only
//! the unlocking-script shapes, which the crate does not classify, are
//! matched here by hand.

use bitcoin::script::Instruction;
use bitcoin::{Address, CompressedPublicKey, Network, PublicKey, Script, ScriptBuf};

use crate::types::{ScriptType, TxInput};

/// Consensus limit on script length; longer scripts can never be spent.
const MAX_SCRIPT_SIZE: usize = 10_000;

// ==============================================================================
// Locking Scripts
// ==============================================================================

#[must_use]
pub fn classify_script(script: &Script) -> ScriptType {
    if script.is_p2pk() {
        ScriptType::P2pk
    } else if script.is_p2pkh() {
        ScriptType::P2pkh
    } else if script.is_p2sh() {
        ScriptType::P2sh
    } else if script.is_p2wpkh() {
        ScriptType::P2wpkh
    } else if script.is_p2wsh() {
        ScriptType::P2wsh
    } else if script.is_p2tr() {
        ScriptType::P2tr
    } else if script.is_multisig() {
        ScriptType::BareMultisig
    } else if is_null_data(script) {
        ScriptType::NullData
    } else {
        ScriptType::Unknown
    }
}

/// `OP_RETURN` followed only by data pushes.
#[must_use]
pub fn is_null_data(script: &Script) -> bool {
    if !script.is_op_return() {
        return false;
    }
    script
        .instructions()
        .skip(1)
        .all(|ins| matches!(ins, Ok(Instruction::PushBytes(_))))
}

/// A script that can never be satisfied: it starts with `OP_RETURN` or
/// exceeds the consensus size limit.
#[must_use]
pub fn is_unspendable(script: &Script) -> bool {
    script.is_op_return() || script.len() > MAX_SCRIPT_SIZE
}

/// Decode the standard destination address of a locking script.
#[must_use]
pub fn decode_destination(script: &Script, network: Network) -> Option<Address> {
    Address::from_script(script, network).ok()
}

/// The first public key carried by a P2PK or bare-multisig script.
#[must_use]
pub fn first_public_key(script: &Script) -> Option<PublicKey> {
    if !(script.is_p2pk() || script.is_multisig()) {
        return None;
    }
    script.instructions().find_map(|ins| match ins {
        Ok(Instruction::PushBytes(bytes)) => PublicKey::from_slice(bytes.as_bytes()).ok(),
        _ => None,
    })
}

/// The address a spent output belongs to. Scripts that embed public keys
/// resolve to the P2PKH address of their first key; every other script
/// resolves to its standard destination.
#[must_use]
pub fn owner_address(script: &Script, network: Network) -> Option<Address> {
    match first_public_key(script) {
        Some(pk) => Some(Address::p2pkh(pk.pubkey_hash(), network)),
        None => decode_destination(script, network),
    }
}

// ==============================================================================
// Unlocking Scripts
// ==============================================================================

/// Recover the address that signed `input` from its scriptSig and witness
/// alone, without looking at the spent output.
///
/// Recognised shapes:
/// - P2PKH: `<sig> <pubkey>`
/// - P2WPKH: empty scriptSig, witness `<sig> <pubkey>`
/// - P2SH-P2WPKH: scriptSig pushes `0014<hash>`, witness `<sig> <pubkey>`
/// - P2SH multisig: `OP_0 <sig>... <redeemScript>`
#[must_use]
pub fn signer_address(input: &TxInput, network: Network) -> Option<Address> {
    let pushes = push_data(&input.script_sig)?;

    if input.witness.len() == 2 {
        let sig = input.witness.nth(0)?;
        let pk = input.witness.nth(1)?;
        if !looks_like_signature(sig) {
            return None;
        }
        let pk = CompressedPublicKey::from_slice(pk).ok()?;
        return match pushes.as_slice() {
            [] => Some(Address::p2wpkh(&pk, network)),
            [redeem] if ScriptBuf::from_bytes(redeem.clone()).is_p2wpkh() => {
                Some(Address::p2shwpkh(&pk, network))
            }
            _ => None,
        };
    }

    if !input.witness.is_empty() {
        return None;
    }

    match pushes.as_slice() {
        [sig, pk] if looks_like_signature(sig) => {
            let pk = PublicKey::from_slice(pk).ok()?;
            Some(Address::p2pkh(pk.pubkey_hash(), network))
        }
        [first, sigs @ .., redeem]
            if first.is_empty() && !sigs.is_empty() && sigs.iter().all(|s| looks_like_signature(s)) =>
        {
            let redeem = ScriptBuf::from_bytes(redeem.clone());
            if !redeem.is_multisig() {
                return None;
            }
            Address::p2sh(&redeem, network).ok()
        }
        _ => None,
    }
}

/// Collect the data of a push-only script. Returns `None` when the script
/// contains any non-push opcode or fails to parse.
fn push_data(script: &Script) -> Option<Vec<Vec<u8>>> {
    script
        .instructions()
        .map(|ins| match ins {
            Ok(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes().to_vec()),
            _ => None,
        })
        .collect()
}

/// DER-encoded ECDSA signature with a trailing sighash byte.
fn looks_like_signature(bytes: &[u8]) -> bool {
    (9..=73).contains(&bytes.len()) && bytes[0] == 0x30
}
