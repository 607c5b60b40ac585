use std::path::PathBuf;

use clap::Parser;

/// walletfeed: per-account wallet history feed over a Bitcoin-compatible node.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Node JSON-RPC URL. Credentials may be embedded as `user:pass@`.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "WALLETFEED_RPC_URL")]
    pub rpc_url: String,

    /// RPC username (takes precedence over URL credentials).
    #[arg(long, env = "WALLETFEED_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[arg(long, env = "WALLETFEED_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Path to the node's `.cookie` file, used when no other credentials are set.
    #[arg(long, env = "WALLETFEED_RPC_COOKIE_FILE")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Outbound RPC request rate limit. Unlimited when omitted.
    #[arg(long, env = "WALLETFEED_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// Maximum number of calls per JSON-RPC batch request.
    #[arg(long, default_value = "50", env = "WALLETFEED_RPC_BATCH_CHUNK_SIZE")]
    pub rpc_batch_chunk_size: usize,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "WALLETFEED_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "WALLETFEED_PORT")]
    pub port: u16,

    /// Directories of wallet exports (`*.jsonl`) to load (repeatable).
    #[arg(long, env = "WALLETFEED_WALLET_DIR", value_delimiter = ',')]
    pub wallet_dir: Vec<PathBuf>,

    /// Maximum concurrent RPC calls per history request.
    #[arg(long, default_value = "8", env = "WALLETFEED_RPC_CONCURRENCY")]
    pub rpc_concurrency: usize,

    /// Number of confirmed transactions kept in the shared cache.
    #[arg(long, default_value = "10000", env = "WALLETFEED_CACHE_TX_CAP")]
    pub cache_tx_cap: usize,

    /// Per-request time budget for classification in milliseconds. When it
    /// runs out the feed is returned truncated.
    #[arg(long, env = "WALLETFEED_HISTORY_TIMEOUT_MS")]
    pub history_timeout_ms: Option<u64>,

    /// Resolve unconfirmed movements against the mempool instead of
    /// reporting them without transaction details.
    #[arg(long, env = "WALLETFEED_RESOLVE_UNCONFIRMED")]
    pub resolve_unconfirmed: bool,

    /// Override the SLIP-44 coin type reported per account.
    #[arg(long, env = "WALLETFEED_COIN_TYPE")]
    pub coin_type: Option<u32>,
}
