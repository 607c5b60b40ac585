//! Decoding of verbose `getrawtransaction` results into domain types.

use bitcoin::hex::FromHex;
use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, Txid, Witness};

use crate::error::CoreError;
use crate::script::classify_script;
use crate::types::{TxInput, TxOutput};

pub(super) fn parse_txid(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Txid, CoreError> {
    let value = value
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::InvalidTxData(format!("missing {field}")))?;
    value
        .parse()
        .map_err(|e| CoreError::InvalidTxData(format!("invalid {field}: {e}")))
}

pub(super) fn parse_opt_block_hash(
    value: Option<&serde_json::Value>,
) -> Result<Option<BlockHash>, CoreError> {
    match value.and_then(serde_json::Value::as_str) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e| CoreError::InvalidTxData(format!("invalid blockhash: {e}"))),
    }
}

pub(super) fn parse_integer_required<T, const SIGNED: bool>(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<T, CoreError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    parse_integer::<T, SIGNED, true>(value, field)?
        .ok_or_else(|| CoreError::InvalidTxData(format!("missing {field}")))
}

pub(super) fn parse_integer_optional<T, const SIGNED: bool>(
    value: Option<&serde_json::Value>,
) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    parse_integer::<T, SIGNED, false>(value, "value")
        .ok()
        .flatten()
}

// `REQUIRED=false` treats missing/null/type-mismatch as `Ok(None)`.
fn parse_integer<T, const SIGNED: bool, const REQUIRED: bool>(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Option<T>, CoreError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    let missing_or_none = || {
        if REQUIRED {
            Err(CoreError::InvalidTxData(format!("missing {field}")))
        } else {
            Ok(None)
        }
    };

    let Some(value) = value else {
        return missing_or_none();
    };

    if SIGNED {
        let Some(n) = value.as_i64() else {
            return missing_or_none();
        };
        T::try_from(n)
            .map(Some)
            .map_err(|_| CoreError::InvalidTxData(format!("{field} out of range: {n}")))
    } else {
        let Some(n) = value.as_u64() else {
            return missing_or_none();
        };
        T::try_from(n)
            .map(Some)
            .map_err(|_| CoreError::InvalidTxData(format!("{field} out of range: {n}")))
    }
}

// ==============================================================================
// Inputs and Outputs
// ==============================================================================

/// Decode the `vin` array. Coinbase inputs carry their data in `coinbase`
/// and have no prevout; all others carry `txid`, `vout` and `scriptSig`.
/// `txinwitness` is present only for segwit spends.
pub(super) fn parse_vin(vin: &[serde_json::Value]) -> Result<Vec<TxInput>, CoreError> {
    vin.iter()
        .map(|input| {
            let sequence = parse_integer_required::<u32, false>(input.get("sequence"), "sequence")?;

            let (prevout, script_sig) = match input.get("coinbase") {
                Some(coinbase) => {
                    let data = coinbase.as_str().ok_or_else(|| {
                        CoreError::InvalidTxData("coinbase data is not a string".into())
                    })?;
                    (None, script_from_hex(data, "coinbase")?)
                }
                None => {
                    let prev_txid = parse_txid(input.get("txid"), "vin.txid")?;
                    let prev_vout =
                        parse_integer_required::<u32, false>(input.get("vout"), "vin.vout")?;
                    let script_sig = match input
                        .get("scriptSig")
                        .and_then(|s| s.get("hex"))
                        .and_then(serde_json::Value::as_str)
                    {
                        Some(hex) => script_from_hex(hex, "scriptSig")?,
                        None => ScriptBuf::new(),
                    };
                    (Some(OutPoint::new(prev_txid, prev_vout)), script_sig)
                }
            };

            let witness = match input.get("txinwitness") {
                None => Witness::new(),
                Some(items) => parse_witness(items)?,
            };

            Ok(TxInput {
                prevout,
                script_sig,
                witness,
                sequence,
            })
        })
        .collect()
}

/// Decode the `vout` array. Outputs are indexed by array position.
pub(super) fn parse_vout(vout: &[serde_json::Value]) -> Result<Vec<TxOutput>, CoreError> {
    vout.iter()
        .map(|output| {
            let value = parse_btc_amount(
                output
                    .get("value")
                    .ok_or_else(|| CoreError::InvalidTxData("missing value in vout".into()))?,
            )?;

            let hex = output
                .get("scriptPubKey")
                .and_then(|spk| spk.get("hex"))
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CoreError::InvalidTxData("missing scriptPubKey hex in vout".into()))?;
            let script_pub_key = script_from_hex(hex, "scriptPubKey")?;
            let script_type = classify_script(&script_pub_key);

            Ok(TxOutput {
                value,
                script_pub_key,
                script_type,
            })
        })
        .collect()
}

fn parse_witness(items: &serde_json::Value) -> Result<Witness, CoreError> {
    let items = items
        .as_array()
        .ok_or_else(|| CoreError::InvalidTxData("txinwitness is not an array".into()))?;
    let stack = items
        .iter()
        .map(|item| {
            let hex = item
                .as_str()
                .ok_or_else(|| CoreError::InvalidTxData("witness item is not a string".into()))?;
            Vec::<u8>::from_hex(hex)
                .map_err(|e| CoreError::InvalidTxData(format!("invalid witness hex: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Witness::from_slice(&stack))
}

fn script_from_hex(hex: &str, field: &str) -> Result<ScriptBuf, CoreError> {
    ScriptBuf::from_hex(hex).map_err(|e| CoreError::InvalidTxData(format!("invalid {field} hex: {e}")))
}

/// Parse a BTC amount from a JSON value.
///
/// Number values are parsed via `Amount::from_float_in` to support scientific
/// notation, while string values are parsed via `Amount::from_str_in`.
pub(super) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| CoreError::InvalidTxData(format!("invalid BTC amount `{value}`")))?;
            Amount::from_float_in(parsed, bitcoin::Denomination::Bitcoin)
                .map_err(|e| CoreError::InvalidTxData(format!("invalid BTC amount `{value}`: {e}")))
        }
        serde_json::Value::String(s) => Amount::from_str_in(s, bitcoin::Denomination::Bitcoin)
            .map_err(|e| CoreError::InvalidTxData(format!("invalid BTC amount `{s}`: {e}"))),
        _ => Err(CoreError::InvalidTxData(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}
