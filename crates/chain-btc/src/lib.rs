//! # chain-btc
//!
//! The Bitcoin transaction engine: address/script classification, UTXO
//! selection, sighash computation, signing, and consensus serialization for
//! P2PK, P2PKH, P2SH-multisig, P2WPKH, and P2TR outputs.

pub mod address;
pub mod assembler;
pub mod constants;
pub mod error;
pub mod network;
pub mod oracle;
pub mod script;
pub mod sighash;
pub mod signer;
pub mod tx;
pub mod utxo;
