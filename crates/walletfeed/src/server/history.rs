use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use walletfeed_core::{assemble, build_history, BuildOptions, WalletHistoryModel};

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryFilterQuery {
    wallet_name: Option<String>,
    account_name: Option<String>,
    address: Option<String>,
    from_date: Option<String>,
}

/// A query that passed validation and is ready to hit the index.
#[derive(Debug)]
struct HistoryRequest {
    wallet_name: String,
    account_name: Option<String>,
    address: Option<Address>,
    from_date: Option<u64>,
}

// ==============================================================================
// Handler
// ==============================================================================

pub(super) async fn get_history_filter(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<HistoryFilterQuery>,
) -> Result<Json<WalletHistoryModel>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let request = validate_query(query, state.params.network)?;
    let address_str = request.address.as_ref().map(ToString::to_string);

    let accounts = state.index.get_history_filter(
        &request.wallet_name,
        address_str.as_deref(),
        request.account_name.as_deref(),
        request.from_date,
    )?;

    let options = BuildOptions {
        concurrency: state.rpc_concurrency,
        deadline: state
            .history_timeout
            .map(|budget| tokio::time::Instant::now() + budget),
        resolve_unconfirmed: state.resolve_unconfirmed,
    };

    let classified = build_history(
        accounts,
        state.repo.as_ref(),
        &state.cache,
        state.params,
        request.address.as_ref(),
        &options,
    )
    .await?;

    let model = assemble(classified, state.params.coin_type);
    tracing::debug!(
        wallet = %request.wallet_name,
        accounts = model.history.len(),
        skipped = model.skipped.len(),
        truncated = model.truncated,
        "served history feed"
    );

    Ok(Json(model))
}

// ==============================================================================
// Validation
// ==============================================================================

fn validate_query(query: HistoryFilterQuery, network: Network) -> Result<HistoryRequest, AppError> {
    let wallet_name = non_blank(query.wallet_name)
        .ok_or_else(|| AppError::BadRequest("walletName is required".to_string()))?;

    let address = non_blank(query.address)
        .map(|raw| parse_address(&raw, network))
        .transpose()?;

    let from_date = non_blank(query.from_date)
        .map(|raw| parse_from_date(&raw))
        .transpose()?;

    Ok(HistoryRequest {
        wallet_name,
        account_name: non_blank(query.account_name),
        address,
        from_date,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_address(raw: &str, network: Network) -> Result<Address, AppError> {
    raw.parse::<Address<NetworkUnchecked>>()
        .map_err(|e| AppError::BadRequest(format!("invalid address: {e}")))?
        .require_network(network)
        .map_err(|e| AppError::BadRequest(format!("invalid address: {e}")))
}

/// Accepts unix seconds or an RFC 3339 timestamp.
fn parse_from_date(raw: &str) -> Result<u64, AppError> {
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(seconds);
    }

    let parsed = OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| {
        AppError::BadRequest(format!(
            "invalid fromDate `{raw}`: expected unix seconds or an RFC 3339 timestamp"
        ))
    })?;
    u64::try_from(parsed.unix_timestamp())
        .map_err(|_| AppError::BadRequest(format!("fromDate `{raw}` is before the unix epoch")))
}
