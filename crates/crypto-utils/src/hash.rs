//! Hash primitives used throughout the engine: single and double SHA-256,
//! HASH160 (the Bitcoin pubkey-hash function), and BIP-340 tagged hashes.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256(`data`).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256(SHA-256(`data`)), the digest used for txids and most legacy
/// sighash preimages.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(`data`)), the digest behind P2PKH/P2WPKH/P2SH hashes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let first = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(first);
    hasher.finalize().into()
}

/// BIP-340 tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || msg)`.
///
/// Used by Schnorr nonce/challenge derivation and the Taproot tweak.
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(msg);
    hasher.finalize().into()
}
