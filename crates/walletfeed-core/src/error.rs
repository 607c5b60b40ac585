use bitcoin::Txid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),

    #[error("invalid transaction data: {0}")]
    InvalidTxData(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("wallet parse error at line {line}: {message}")]
    WalletParse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures talking to the JSON-RPC endpoint itself, as opposed to
/// problems with the data it returned.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing JSON-RPC batch item id={id}")]
    MissingBatchItem { id: u64 },
}

/// Why the owning address of a transaction input could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("coinbase input has no previous output")]
    Coinbase,

    #[error("previous transaction lookup failed: {0}")]
    PrevTx(#[source] CoreError),

    #[error("previous output {txid}:{vout} does not exist")]
    MissingPrevOutput { txid: Txid, vout: u32 },

    #[error("previous output {txid}:{vout} has no decodable destination")]
    NoDestination { txid: Txid, vout: u32 },
}
