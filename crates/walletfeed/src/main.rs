mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};

use walletfeed_core::cache::Cache;
use walletfeed_core::rpc::{HttpRpcClient, TxRepository};
use walletfeed_core::wallet::{HistoryIndex, WalletStore};
use walletfeed_core::ChainParams;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    if args.rpc_concurrency == 0 {
        return Err(eyre!("--rpc-concurrency must be at least 1"));
    }

    // Random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex_encode(bytes)
    };

    // Connect to the node and verify the connection before serving.
    let repo: Arc<dyn TxRepository> = Arc::new(
        HttpRpcClient::new(
            &args.rpc_url,
            args.rpc_user.as_deref(),
            args.rpc_pass.as_deref(),
            args.rpc_cookie_file.as_deref(),
            args.rpc_requests_per_second,
            args.rpc_batch_chunk_size,
        )
        .context("configure RPC client")?,
    );

    let chain_info = repo.get_blockchain_info().await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to node RPC")
    })?;

    tracing::info!(
        chain = %chain_info.chain,
        blocks = chain_info.blocks,
        "connected to node"
    );
    if chain_info.pruned {
        tracing::warn!("node is pruned; history entries in pruned blocks will be skipped");
    }

    let network = chain_info
        .network()
        .ok_or_else(|| eyre!("unrecognized chain name `{}` from getblockchaininfo", chain_info.chain))?;
    let params = match args.coin_type {
        Some(coin_type) => ChainParams::new(network).with_coin_type(coin_type),
        None => ChainParams::new(network),
    };

    let mut wallets = WalletStore::new();
    for dir in &args.wallet_dir {
        wallets
            .load_dir(dir)
            .with_context(|| format!("load wallet directory {}", dir.display()))?;
        tracing::info!(path = %dir.display(), "loaded wallet directory");
    }
    let index: Arc<dyn HistoryIndex> = Arc::new(wallets);
    if index.wallets().is_empty() {
        tracing::warn!("no wallets loaded; pass --wallet-dir to serve history");
    }

    let state = server::AppState {
        repo,
        cache: Arc::new(Cache::with_capacity(args.cache_tx_cap)),
        index,
        api_token: api_token.clone(),
        params,
        rpc_concurrency: args.rpc_concurrency,
        history_timeout: args.history_timeout_ms.map(Duration::from_millis),
        resolve_unconfirmed: args.resolve_unconfirmed,
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is accessible from the network");
    }

    println!();
    println!("  walletfeed is running:");
    println!("    URL:       http://{bind_addr}");
    println!("    API token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .await
        .context("run HTTP server")?;

    Ok(())
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{}`", redact_url(rpc_url)),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; verify --rpc-user/--rpc-pass or --rpc-cookie-file"
                .into(),
        );
    } else if source_error.contains("cookie") {
        lines.push("hint: the cookie file is rewritten on node restart; check the path and permissions".into());
    } else if source_error.contains("error sending request for url") {
        lines.push("hint: request could not be sent; verify URL format, network access, and endpoint reachability".into());
    }

    lines.join("\n")
}

/// Hide `user:pass@` credentials before the URL reaches a log line.
fn redact_url(rpc_url: &str) -> String {
    let Some((scheme, rest)) = rpc_url.split_once("://") else {
        return rpc_url.to_owned();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => rpc_url.to_owned(),
    }
}
