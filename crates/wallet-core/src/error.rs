use thiserror::Error;

/// Top-level error for the wallet-core orchestration layer, aggregating the
/// transaction engine's error type plus descriptor-loading failures that
/// never reach `chain-btc`.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid wallet descriptor: {0}")]
    InvalidWalletDescriptor(String),

    #[error("malformed wallet descriptor json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] chain_btc::error::BtcError),
}
