mod auth;
mod error;
mod history;
mod transactions;
mod wallets;

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use axum::http::{HeaderValue, Method};
use axum::routing::{any, get};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use walletfeed_core::cache::Cache;
use walletfeed_core::rpc::TxRepository;
use walletfeed_core::wallet::HistoryIndex;
use walletfeed_core::ChainParams;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub repo: Arc<dyn TxRepository>,
    pub cache: Arc<Cache>,
    pub index: Arc<dyn HistoryIndex>,
    pub api_token: String,
    pub params: ChainParams,
    pub rpc_concurrency: usize,
    /// Time budget of one history request; `None` waits for every entry.
    pub history_timeout: Option<Duration>,
    pub resolve_unconfirmed: bool,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> Result<Router, InvalidHeaderValue> {
    // Reflect the origin only on an exact match so other origins get a
    // clean CORS rejection.
    let allowed: HeaderValue = origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, auth::API_TOKEN_HEADER]);

    let shared = Arc::new(state);

    let public_api = Router::new().route("/api/v1/health", get(health));

    let protected_api = Router::new()
        .route("/api/v1/wallets", get(wallets::list_wallets))
        .route("/api/v1/history-filter", get(history::get_history_filter))
        .route(
            "/api/v1/transactions/{txid}",
            get(transactions::get_transaction),
        );

    Ok(Router::new()
        .merge(public_api)
        .merge(protected_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bitcoin::hashes::Hash;
    use bitcoin::{
        Address, Amount, BlockHash, CompressedPublicKey, Network, OutPoint, PublicKey, ScriptBuf,
        Txid, Witness,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use walletfeed_core::error::{CoreError, RpcError};
    use walletfeed_core::rpc::ChainInfo;
    use walletfeed_core::types::{BlockHeight, ResolvedTx, ScriptType, TxInput, TxOutput};
    use walletfeed_core::wallet::WalletStore;

    const TOKEN: &str = "test-token";

    #[derive(Clone, Copy)]
    enum FakeRepoMode {
        Ok,
        RpcFailure,
    }

    struct FakeRepo {
        mode: FakeRepoMode,
        txs: HashMap<Txid, ResolvedTx>,
    }

    #[async_trait]
    impl TxRepository for FakeRepo {
        async fn get_transaction(&self, txid: &Txid) -> Result<ResolvedTx, CoreError> {
            match self.mode {
                FakeRepoMode::Ok => self
                    .txs
                    .get(txid)
                    .cloned()
                    .ok_or(CoreError::TxNotFound(*txid)),
                FakeRepoMode::RpcFailure => Err(CoreError::Rpc(RpcError::ServerError {
                    code: -28,
                    message: "Loading block index...".to_string(),
                })),
            }
        }

        async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
            Ok(ChainInfo {
                chain: "regtest".to_string(),
                blocks: 101,
                best_block_hash: BlockHash::all_zeros(),
                pruned: false,
            })
        }
    }

    fn address(key_hex: &str) -> Address {
        let pk: PublicKey = key_hex.parse().expect("test key must parse");
        Address::p2wpkh(&CompressedPublicKey(pk.inner), Network::Regtest)
    }

    /// Address that funded the wallet (key G).
    fn sender() -> Address {
        address("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
    }

    /// The wallet's own receiving address (key 2G).
    fn own() -> Address {
        address("02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5")
    }

    fn txid(byte: u8) -> Txid {
        Txid::from_byte_array([byte; 32])
    }

    fn tx(id: Txid, inputs: Vec<TxInput>, pay_to: &Address, sats: u64, height: u32) -> ResolvedTx {
        ResolvedTx {
            txid: id,
            version: 2,
            locktime: 0,
            block_hash: Some(BlockHash::all_zeros()),
            block_height: Some(BlockHeight(height)),
            inputs,
            outputs: vec![TxOutput {
                value: Amount::from_sat(sats),
                script_pub_key: pay_to.script_pubkey(),
                script_type: ScriptType::P2wpkh,
            }],
        }
    }

    /// Parent 0x10 pays the sender; 0x20 spends it and pays the wallet.
    fn fake_repo(mode: FakeRepoMode) -> FakeRepo {
        let parent = tx(txid(0x10), Vec::new(), &sender(), 10_000, 100);
        let funding = tx(
            txid(0x20),
            vec![TxInput {
                prevout: Some(OutPoint::new(txid(0x10), 0)),
                script_sig: ScriptBuf::new(),
                witness: Witness::new(),
                sequence: 0xFFFF_FFFE,
            }],
            &own(),
            5_000,
            101,
        );
        FakeRepo {
            mode,
            txs: [parent, funding].into_iter().map(|t| (t.txid, t)).collect(),
        }
    }

    fn wallet_store() -> WalletStore {
        let lines = [
            serde_json::json!({
                "record": "account",
                "name": "account 0",
                "hdPath": "m/84'/1'/0'",
            }),
            serde_json::json!({
                "record": "movement",
                "account": "account 0",
                "direction": "received",
                "txid": txid(0x20).to_string(),
                "vout": 0,
                "amount": 5_000,
                "address": own().to_string(),
                "hdPath": "m/84'/1'/0'/0/0",
                "createdAt": 1_700_000_000u64,
                "blockHeight": 101,
                "blockIndex": 1,
            }),
        ];
        let content = lines
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        let mut store = WalletStore::new();
        store.import("main", &content).expect("wallet must import");
        store
    }

    fn test_router(mode: FakeRepoMode) -> Router {
        let state = AppState {
            repo: Arc::new(fake_repo(mode)),
            cache: Arc::new(Cache::with_capacity(100)),
            index: Arc::new(wallet_store()),
            api_token: TOKEN.to_string(),
            params: ChainParams::new(Network::Regtest),
            rpc_concurrency: 4,
            history_timeout: None,
            resolve_unconfirmed: false,
        };
        build_router(state, "http://127.0.0.1:3090").expect("origin must parse")
    }

    async fn call(router: Router, uri: &str, token: Option<&str>) -> axum::response::Response {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header("x-api-token", token);
        }
        router
            .oneshot(request.body(Body::empty()).expect("request must build"))
            .await
            .expect("router should serve request")
    }

    async fn response_body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        serde_json::from_slice(&bytes).expect("response body must be valid JSON")
    }

    #[tokio::test]
    async fn unknown_api_route_returns_json_404() {
        let response = call(test_router(FakeRepoMode::Ok), "/api/v1/does-not-exist", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_body_json(response).await;
        assert_eq!(
            json.get("error").and_then(Value::as_str),
            Some("API route not found")
        );
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = call(test_router(FakeRepoMode::Ok), "/api/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_the_api_token() {
        let router = test_router(FakeRepoMode::Ok);
        let response = call(router.clone(), "/api/v1/wallets", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = call(router, "/api/v1/history-filter?walletName=main", Some("nope")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wallets_lists_loaded_wallets() {
        let response = call(test_router(FakeRepoMode::Ok), "/api/v1/wallets", Some(TOKEN)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_body_json(response).await;
        assert_eq!(json["wallets"][0]["name"], "main");
        assert_eq!(json["wallets"][0]["accountCount"], 1);
        assert_eq!(json["wallets"][0]["movementCount"], 1);
    }

    #[tokio::test]
    async fn history_filter_returns_attributed_feed() {
        let response = call(
            test_router(FakeRepoMode::Ok),
            "/api/v1/history-filter?walletName=main",
            Some(TOKEN),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_body_json(response).await;
        let account = &json["history"][0];
        assert_eq!(account["accountName"], "account 0");
        assert_eq!(account["accountHdPath"], "m/84'/1'/0'");
        assert_eq!(account["coinType"], 1);

        let item = &account["transactionsHistory"][0];
        assert_eq!(item["type"], "received");
        assert_eq!(item["id"], txid(0x20).to_string());
        assert_eq!(item["amount"], 5_000);
        assert_eq!(item["confirmedInBlock"], 101);
        assert_eq!(item["timestamp"], 1_700_000_000u64);
        assert_eq!(item["inputs"][0]["address"], sender().to_string());
        assert_eq!(item["payments"][0]["destinationAddress"], own().to_string());
        assert!(json.get("skipped").is_none());
        assert!(json.get("truncated").is_none());
    }

    #[tokio::test]
    async fn history_filter_scopes_receives_to_spending_address() {
        let router = test_router(FakeRepoMode::Ok);

        let uri = format!("/api/v1/history-filter?walletName=main&address={}", sender());
        let json = response_body_json(call(router.clone(), &uri, Some(TOKEN)).await).await;
        assert_eq!(json["history"][0]["transactionsHistory"].as_array().map(Vec::len), Some(1));

        let uri = format!("/api/v1/history-filter?walletName=main&address={}", own());
        let json = response_body_json(call(router, &uri, Some(TOKEN)).await).await;
        assert_eq!(json["history"][0]["transactionsHistory"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn history_filter_from_date_excludes_older_movements() {
        let response = call(
            test_router(FakeRepoMode::Ok),
            "/api/v1/history-filter?walletName=main&fromDate=2024-01-01T00:00:00Z",
            Some(TOKEN),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_body_json(response).await;
        assert_eq!(json["history"][0]["transactionsHistory"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn history_filter_validation_errors_return_400() {
        let router = test_router(FakeRepoMode::Ok);
        for uri in [
            "/api/v1/history-filter",
            "/api/v1/history-filter?walletName=%20",
            "/api/v1/history-filter?walletName=main&fromDate=yesterday",
            // Mainnet address on a regtest node.
            "/api/v1/history-filter?walletName=main&address=bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
        ] {
            let response = call(router.clone(), uri, Some(TOKEN)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn history_filter_unknown_wallet_or_account_is_404() {
        let router = test_router(FakeRepoMode::Ok);
        for uri in [
            "/api/v1/history-filter?walletName=other",
            "/api/v1/history-filter?walletName=main&accountName=account%209",
        ] {
            let response = call(router.clone(), uri, Some(TOKEN)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn history_filter_rpc_failure_maps_to_502() {
        let response = call(
            test_router(FakeRepoMode::RpcFailure),
            "/api/v1/history-filter?walletName=main",
            Some(TOKEN),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn transaction_view_decodes_outputs_and_inputs() {
        let uri = format!("/api/v1/transactions/{}", txid(0x20));
        let response = call(test_router(FakeRepoMode::Ok), &uri, Some(TOKEN)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_body_json(response).await;
        assert_eq!(json["blockHeight"], 101);
        assert_eq!(json["coinstake"], false);
        assert_eq!(json["outputs"][0]["address"], own().to_string());
        assert_eq!(json["outputs"][0]["scriptPubKey"]["type"], "witness_v0_keyhash");
        assert_eq!(json["inputs"][0]["address"], sender().to_string());
    }

    #[tokio::test]
    async fn transaction_view_errors() {
        let router = test_router(FakeRepoMode::Ok);

        let uri = format!("/api/v1/transactions/{}", txid(0x99));
        let response = call(router.clone(), &uri, Some(TOKEN)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = call(router, "/api/v1/transactions/not-a-txid", Some(TOKEN)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
