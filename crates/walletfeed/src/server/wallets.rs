use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use walletfeed_core::wallet::WalletSummary;

use super::auth::check_auth;
use super::error::AppError;
use super::SharedState;

#[derive(Serialize)]
pub(super) struct WalletsResponse {
    wallets: Vec<WalletSummary>,
}

pub(super) async fn list_wallets(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<WalletsResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let mut wallets = state.index.wallets();
    wallets.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(WalletsResponse { wallets }))
}
