use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use futures::future::try_join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use lru::LruCache;
use reqwest::header;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{CoreError, RpcError};
use crate::types::{BlockHeight, ResolvedTx};

use super::super::types::ChainInfo;
use super::super::TxRepository;
use super::connection::{parse_connection, resolve_auth};
use super::parsing::{
    parse_integer_optional, parse_integer_required, parse_opt_block_hash, parse_txid, parse_vin,
    parse_vout,
};
use super::protocol::{parse_batch_id, Call, JsonRpcRequest, JsonRpcResponse};

/// Maximum number of block-hash → height entries cached in memory.
const BLOCK_HEIGHT_CACHE_CAP: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(cap) => cap,
    None => panic!("block height cache capacity must be non-zero"),
};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// JSON-RPC transaction repository over HTTP(S).
///
/// Supports both single and batched RPC calls. Maintains an LRU cache of
/// block-hash-to-height mappings to avoid redundant `getblockheader` calls
/// for confirmed transactions whose verbose result lacks `blockheight`.
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    batch_chunk_size: usize,
    next_id: AtomicU64,
    /// Confirmed block heights are immutable, so entries never need
    /// invalidation, only eviction.
    block_height_cache: RwLock<LruCache<BlockHash, BlockHeight>>,
}

impl HttpRpcClient {
    /// Create a new client for an `http://` or `https://` URL.
    ///
    /// Credentials are taken from `user` + `pass`, then from the URL
    /// itself, then from `cookie_file`. If `requests_per_second` is set,
    /// calls are rate-limited per outbound HTTP request (a batch counts as
    /// one request).
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        cookie_file: Option<&Path>,
        requests_per_second: Option<u32>,
        batch_chunk_size: usize,
    ) -> Result<Self, CoreError> {
        if batch_chunk_size == 0 {
            return Err(CoreError::Config(
                "rpc batch chunk size must be at least 1".to_owned(),
            ));
        }
        let endpoint = parse_connection(connection)?;
        let auth = resolve_auth(user, pass, endpoint.url_auth, cookie_file)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(RpcError::Transport)?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::Config("rpc requests per second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url: endpoint.url,
            auth,
            limiter,
            batch_chunk_size,
            next_id: AtomicU64::new(initial_request_id()),
            block_height_cache: RwLock::new(LruCache::new(BLOCK_HEIGHT_CACHE_CAP)),
        })
    }

    /// Atomically reserve `count` consecutive request IDs for batch calls.
    fn reserve_request_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    /// Send one JSON body and return the raw response text. Rate limiting
    /// and auth are applied here so single and batch calls share them.
    async fn post<T: serde::Serialize + ?Sized>(&self, body: &T) -> Result<String, CoreError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();
        let text = response.text().await.map_err(RpcError::Transport)?;
        debug!(%status, body_len = text.len(), "rpc response");
        trace!(body = %text, "rpc response body");
        Ok(text)
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, CoreError> {
        let id = self.reserve_request_ids(1);
        debug!(rpc.id = id, rpc.method = method, rpc.params = params.len(), "rpc call");

        let body = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;
        decoded.into_result()
    }

    /// Send `calls` as one batch and return results in call order. Any
    /// per-call error fails the whole batch.
    async fn rpc_batch(&self, calls: &[Call]) -> Result<Vec<serde_json::Value>, CoreError> {
        let start_id = self.reserve_request_ids(calls.len() as u64);
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            "rpc batch call"
        );
        let requests: Vec<JsonRpcRequest<'_>> = calls
            .iter()
            .enumerate()
            .map(|(offset, (method, params))| {
                JsonRpcRequest::new(start_id + offset as u64, method, params)
            })
            .collect();

        let body = self.post(&requests).await?;
        let decoded: Vec<JsonRpcResponse> = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC batch response: {e}; body={body}"))
        })?;

        let mut by_id: HashMap<u64, JsonRpcResponse> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            by_id.insert(parse_batch_id(&item.id)?, item);
        }

        (start_id..start_id + calls.len() as u64)
            .map(|id| {
                by_id
                    .remove(&id)
                    .ok_or(RpcError::MissingBatchItem { id })?
                    .into_result()
            })
            .collect()
    }

    async fn rpc_batch_chunked(&self, calls: &[Call]) -> Result<Vec<serde_json::Value>, CoreError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        // Chunks stay under node/proxy payload limits and are issued
        // concurrently.
        let chunk_futures: Vec<_> = calls
            .chunks(self.batch_chunk_size)
            .map(|chunk| self.rpc_batch(chunk))
            .collect();
        let chunked = try_join_all(chunk_futures).await?;
        Ok(chunked.into_iter().flatten().collect())
    }

    async fn resolved_tx_from_raw(&self, raw: serde_json::Value) -> Result<ResolvedTx, CoreError> {
        let txid = parse_txid(raw.get("txid"), "txid")?;
        let version = parse_integer_required::<i32, true>(raw.get("version"), "version")?;
        let locktime = parse_integer_required::<u32, false>(raw.get("locktime"), "locktime")?;
        let block_hash = parse_opt_block_hash(raw.get("blockhash"))?;
        let mut block_height =
            parse_integer_optional::<u32, false>(raw.get("blockheight")).map(BlockHeight);
        let confirmations = parse_integer_optional::<u64, false>(raw.get("confirmations"));

        if block_height.is_none() {
            if let Some(block_hash) = block_hash {
                if confirmations.unwrap_or(0) > 0 {
                    block_height = self.get_block_height(block_hash).await?;
                }
            }
        }

        let vin = raw
            .get("vin")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| CoreError::InvalidTxData(format!("{txid}: missing vin array")))?;
        let vout = raw
            .get("vout")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| CoreError::InvalidTxData(format!("{txid}: missing vout array")))?;

        Ok(ResolvedTx {
            txid,
            version,
            locktime,
            block_hash,
            block_height,
            inputs: parse_vin(vin)?,
            outputs: parse_vout(vout)?,
        })
    }

    async fn get_block_height(
        &self,
        block_hash: BlockHash,
    ) -> Result<Option<BlockHeight>, CoreError> {
        // `LruCache::get` updates recency, hence the write lock.
        if let Some(height) = self
            .block_height_cache
            .write()
            .await
            .get(&block_hash)
            .copied()
        {
            return Ok(Some(height));
        }

        let raw = self
            .rpc_call(
                "getblockheader",
                &[
                    serde_json::json!(block_hash.to_string()),
                    serde_json::json!(true),
                ],
            )
            .await?;
        let height = parse_integer_optional::<u32, false>(raw.get("height")).map(BlockHeight);
        if let Some(height) = height {
            self.block_height_cache
                .write()
                .await
                .put(block_hash, height);
        }
        Ok(height)
    }
}

fn getrawtransaction_params(txid: &Txid) -> Vec<serde_json::Value> {
    vec![serde_json::json!(txid.to_string()), serde_json::json!(1)]
}

#[async_trait]
impl TxRepository for HttpRpcClient {
    async fn get_transaction(&self, txid: &Txid) -> Result<ResolvedTx, CoreError> {
        let raw = self
            .rpc_call("getrawtransaction", &getrawtransaction_params(txid))
            .await
            .map_err(|err| normalize_getrawtransaction_error(txid, err))?;
        self.resolved_tx_from_raw(raw).await
    }

    async fn get_transactions(&self, txids: &[Txid]) -> Result<Vec<ResolvedTx>, CoreError> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<Call> = txids
            .iter()
            .map(|txid| ("getrawtransaction", getrawtransaction_params(txid)))
            .collect();

        let raw_results = match self.rpc_batch_chunked(&calls).await {
            Ok(results) => results,
            Err(batch_error) => {
                // One unknown txid fails the whole batch; the sequential path
                // reports it as a typed `TxNotFound`.
                warn!(
                    tx_count = txids.len(),
                    error = %batch_error,
                    "batch getrawtransaction failed; falling back to sequential requests"
                );

                let mut sequential = Vec::with_capacity(txids.len());
                for txid in txids {
                    sequential.push(self.get_transaction(txid).await?);
                }
                return Ok(sequential);
            }
        };

        try_join_all(
            raw_results
                .into_iter()
                .map(|raw| self.resolved_tx_from_raw(raw)),
        )
        .await
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        let raw = self.rpc_call("getblockchaininfo", &[]).await?;
        serde_json::from_value(raw).map_err(|e| {
            RpcError::InvalidResponse(format!("invalid getblockchaininfo result: {e}")).into()
        })
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// ==============================================================================
// RPC Error Normalization
// ==============================================================================

/// Convert "missing tx" JSON-RPC responses into `TxNotFound`, preserving
/// all other RPC and transport failures as-is.
fn normalize_getrawtransaction_error(txid: &Txid, err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { code, message })
            if is_tx_not_found_server_error(code, &message) =>
        {
            CoreError::TxNotFound(*txid)
        }
        other => other,
    }
}

fn is_tx_not_found_server_error(code: i64, message: &str) -> bool {
    if code != -5 {
        return false;
    }

    let msg = message.to_ascii_lowercase();
    msg.contains("not found") || msg.contains("no such mempool or blockchain transaction")
}
