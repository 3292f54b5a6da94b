use thiserror::Error;

/// Errors raised by the codec primitives (hashing, varint, Base58Check,
/// Bech32/Bech32m, DER framing).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("base58check checksum mismatch")]
    InvalidChecksum,

    #[error("base58 payload too short: {0} bytes")]
    PayloadTooShort(usize),

    #[error("invalid base58 character: {0:?}")]
    InvalidBase58Char(char),

    #[error("invalid bech32 string: {0}")]
    InvalidBech32(String),

    #[error("bech32 checksum mismatch")]
    InvalidBech32Checksum,

    #[error("bit conversion out of range")]
    BitConversionOutOfRange,

    #[error("varint truncated: need {needed} bytes, have {have}")]
    VarintTruncated { needed: usize, have: usize },

    #[error("value out of range: {0}")]
    OutOfRange(String),
}
