use crypto_utils::CodecError;
use thiserror::Error;

/// Errors raised anywhere in the Bitcoin transaction engine.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("invalid wallet descriptor: {0}")]
    InvalidWalletDescriptor(String),

    #[error("insufficient funds: have {available} sat, need at least {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("not enough matching keys: found {found}, need {required}")]
    NotEnoughKeys { found: usize, required: usize },

    #[error("chain oracle error: {0}")]
    OracleError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
