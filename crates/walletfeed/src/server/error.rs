use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use walletfeed_core::error::RpcError;
use walletfeed_core::wallet::WalletStoreError;
use walletfeed_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TxNotFound(txid) => Self::NotFound(format!("transaction not found: {txid}")),
            // The node returned data that could not be decoded.
            CoreError::InvalidTxData(message) => {
                Self::BadGateway(format!("undecodable node response: {message}"))
            }
            CoreError::Rpc(rpc) => map_rpc_error(rpc),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<WalletStoreError> for AppError {
    fn from(err: WalletStoreError) -> Self {
        match err {
            WalletStoreError::WalletNotFound(_) | WalletStoreError::AccountNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            WalletStoreError::EmptyWalletName => Self::BadRequest(err.to_string()),
            WalletStoreError::DuplicateWallet(_) => Self::Internal(err.to_string()),
            WalletStoreError::Core(core) => core.into(),
        }
    }
}

fn map_rpc_error(err: RpcError) -> AppError {
    tracing::warn!(error = %err, "node RPC failure");
    AppError::BadGateway(format!("node rpc error: {err}"))
}
