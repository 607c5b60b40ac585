//! Owning-address resolution for transaction inputs.

use bitcoin::{Address, Network};

use crate::error::AttributionError;
use crate::resolve::TxResolver;
use crate::script::{owner_address, signer_address};
use crate::types::TxInput;

/// Resolve the address that owned the value consumed by `input`.
///
/// The unlocking script is tried first, so standard single-key and P2SH
/// multisig spends never touch the repository. Otherwise the spent output
/// is fetched and its locking script decoded.
pub async fn attribute_input(
    input: &TxInput,
    network: Network,
    resolver: &TxResolver<'_>,
) -> Result<Address, AttributionError> {
    if let Some(address) = signer_address(input, network) {
        return Ok(address);
    }

    let prevout = input.prevout.ok_or(AttributionError::Coinbase)?;
    let prev_tx = resolver
        .fetch(&prevout.txid)
        .await
        .map_err(AttributionError::PrevTx)?;

    let output = prev_tx
        .outputs
        .get(prevout.vout as usize)
        .ok_or(AttributionError::MissingPrevOutput {
            txid: prevout.txid,
            vout: prevout.vout,
        })?;

    owner_address(&output.script_pub_key, network).ok_or(AttributionError::NoDestination {
        txid: prevout.txid,
        vout: prevout.vout,
    })
}
