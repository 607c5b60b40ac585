use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use bitcoin::{Amount, BlockHash, Txid};
use serde::Serialize;

use walletfeed_core::attribution::attribute_input;
use walletfeed_core::model::{InputDetail, OutputScriptView, ScriptView};
use walletfeed_core::resolve::TxResolver;
use walletfeed_core::script::decode_destination;
use walletfeed_core::types::{BlockHeight, ResolvedTx, TxOutput};

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

/// Verbose transaction view with every input attributed and every output
/// decoded to its destination address where one exists.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TransactionView {
    txid: Txid,
    version: i32,
    locktime: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_hash: Option<BlockHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_height: Option<BlockHeight>,
    coinbase: bool,
    coinstake: bool,
    inputs: Vec<InputDetail>,
    outputs: Vec<OutputView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OutputView {
    n: u32,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    value: Amount,
    script_pub_key: OutputScriptView,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

// ==============================================================================
// Handler
// ==============================================================================

pub(super) async fn get_transaction(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(txid_str): Path<String>,
) -> Result<Json<TransactionView>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let txid: Txid = txid_str
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))?;

    let resolver = TxResolver::new(state.repo.as_ref(), &state.cache, state.rpc_concurrency);
    let tx = resolver.fetch(&txid).await?;

    let parents: Vec<Txid> = tx
        .inputs
        .iter()
        .filter_map(|input| input.prevout.map(|p| p.txid))
        .collect();
    resolver.prefetch(&parents).await;

    let network = state.params.network;
    let mut inputs = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let address = match attribute_input(input, network, &resolver).await {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::debug!(txid = %txid, error = %err, "input not attributed");
                None
            }
        };
        inputs.push(InputDetail::new(input, address.as_ref()));
    }

    let outputs = tx
        .outputs
        .iter()
        .zip(0u32..)
        .map(|(output, n)| output_view(n, output, network))
        .collect();

    Ok(Json(view(&tx, inputs, outputs)))
}

fn output_view(n: u32, output: &TxOutput, network: bitcoin::Network) -> OutputView {
    let script = ScriptView::new(&output.script_pub_key);
    OutputView {
        n,
        value: output.value,
        script_pub_key: OutputScriptView {
            asm: script.asm,
            hex: script.hex,
            script_type: output.script_type.to_string(),
        },
        address: decode_destination(&output.script_pub_key, network).map(|a| a.to_string()),
    }
}

fn view(tx: &ResolvedTx, inputs: Vec<InputDetail>, outputs: Vec<OutputView>) -> TransactionView {
    TransactionView {
        txid: tx.txid,
        version: tx.version,
        locktime: tx.locktime,
        block_hash: tx.block_hash,
        block_height: tx.block_height,
        coinbase: tx.is_coinbase(),
        coinstake: tx.is_coinstake(),
        inputs,
        outputs,
    }
}
