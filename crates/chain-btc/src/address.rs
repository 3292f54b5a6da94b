//! Address encoding and decoding across all five supported families.

use crypto_utils::{bech32, hash::hash160};

use crate::error::BtcError;
use crate::network::Network;
use crate::script;

/// The decoded payload of an address string, before it is turned into a
/// scriptPubKey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedAddress {
    /// A Bech32/Bech32m witness program, with its version byte.
    Witness { version: u8, program: Vec<u8> },
    /// A Base58Check-decoded 20-byte hash, tagged with which version byte it
    /// came from so the caller can distinguish P2PKH from P2SH.
    Base58 { version: u8, hash: [u8; 20] },
    /// A bare public key (P2PK), 33 or 65 bytes.
    PubKey(Vec<u8>),
}

/// Decodes an address string into its family-tagged payload.
///
/// Dispatches on prefix: `bc1`/`tb1`/`bcrt1` → Bech32/Bech32m; a valid
/// 33/65-byte hex pubkey → bare P2PK; otherwise Base58Check.
pub fn decode_address(address: &str) -> Result<DecodedAddress, BtcError> {
    if address.starts_with("bc1") || address.starts_with("tb1") || address.starts_with("bcrt1") {
        return decode_witness_address(address);
    }

    if let Ok(bytes) = hex::decode(address) {
        if bytes.len() == 33 && (bytes[0] == 0x02 || bytes[0] == 0x03) {
            return Ok(DecodedAddress::PubKey(bytes));
        }
        if bytes.len() == 65 && bytes[0] == 0x04 {
            return Ok(DecodedAddress::PubKey(bytes));
        }
    }

    let payload = crypto_utils::base58::check_decode(address)?;
    if payload.len() != 21 {
        return Err(BtcError::InvalidAddress(format!(
            "base58check payload must be 21 bytes, got {}",
            payload.len()
        )));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(DecodedAddress::Base58 { version: payload[0], hash })
}

fn decode_witness_address(address: &str) -> Result<DecodedAddress, BtcError> {
    let (_hrp, data, variant) = bech32::decode(address)
        .map_err(|e| BtcError::InvalidAddress(format!("bech32 decode failed: {e}")))?;
    if data.is_empty() {
        return Err(BtcError::InvalidAddress("empty witness program data".into()));
    }
    let version = data[0];
    let program = bech32::convertbits(&data[1..], 5, 8, false)
        .map_err(|e| BtcError::InvalidAddress(format!("witness program bit conversion failed: {e}")))?;

    match version {
        0 => {
            if variant != bech32::Variant::Bech32 {
                return Err(BtcError::InvalidAddress("witness v0 must use bech32, not bech32m".into()));
            }
            if program.len() != 20 && program.len() != 32 {
                return Err(BtcError::InvalidAddress(format!(
                    "witness v0 program must be 20 or 32 bytes, got {}",
                    program.len()
                )));
            }
        }
        1..=16 => {
            if variant != bech32::Variant::Bech32m {
                return Err(BtcError::InvalidAddress("witness v1+ must use bech32m, not bech32".into()));
            }
            if version == 1 && program.len() != 32 {
                return Err(BtcError::InvalidAddress(format!(
                    "witness v1 program must be 32 bytes, got {}",
                    program.len()
                )));
            }
        }
        _ => return Err(BtcError::InvalidAddress(format!("invalid witness version {version}"))),
    }

    Ok(DecodedAddress::Witness { version, program })
}

/// Builds the scriptPubKey that `decoded` addresses, given the network it
/// was parsed under (needed to discriminate P2PKH from P2SH, both of which
/// share the 20-byte-hash Base58 shape).
pub fn build_spk_for(decoded: &DecodedAddress, network: Network) -> Result<Vec<u8>, BtcError> {
    let params = network.params();
    match decoded {
        DecodedAddress::Witness { version: 0, program } if program.len() == 20 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(program);
            Ok(script::spk_p2wpkh(&hash))
        }
        DecodedAddress::Witness { version: 1, program } => {
            let mut key = [0u8; 32];
            key.copy_from_slice(program);
            Ok(script::spk_p2tr(&key))
        }
        DecodedAddress::Witness { .. } => {
            Err(BtcError::InvalidAddress("unsupported witness program shape".into()))
        }
        DecodedAddress::Base58 { version, hash } if *version == params.p2pkh_version => {
            Ok(script::spk_p2pkh(hash))
        }
        DecodedAddress::Base58 { version, hash } if *version == params.p2sh_version => {
            Ok(script::spk_p2sh(hash))
        }
        DecodedAddress::Base58 { version, .. } => Err(BtcError::InvalidAddress(format!(
            "address version byte {version:#04x} does not match network {network}"
        ))),
        DecodedAddress::PubKey(pubkey) => script::spk_p2pk(pubkey),
    }
}

/// Encodes a 20-byte hash as a P2PKH address for `network`.
pub fn encode_p2pkh_address(hash: &[u8; 20], network: Network) -> String {
    let params = network.params();
    let mut payload = vec![params.p2pkh_version];
    payload.extend_from_slice(hash);
    crypto_utils::base58::check_encode(&payload)
}

/// Encodes a 20-byte redeem-script hash as a P2SH address for `network`.
pub fn encode_p2sh_address(hash: &[u8; 20], network: Network) -> String {
    let params = network.params();
    let mut payload = vec![params.p2sh_version];
    payload.extend_from_slice(hash);
    crypto_utils::base58::check_encode(&payload)
}

/// Encodes a 20-byte pubkey hash as a native SegWit v0 (Bech32) address.
pub fn encode_p2wpkh_address(hash: &[u8; 20], network: Network) -> Result<String, BtcError> {
    let params = network.params();
    let mut data = vec![0u8];
    data.extend(bech32::convertbits(hash, 8, 5, true)?);
    Ok(bech32::encode(params.hrp, &data, bech32::Variant::Bech32)?)
}

/// Encodes a 32-byte tweaked output key as a Taproot (Bech32m) address.
pub fn encode_p2tr_address(output_key: &[u8; 32], network: Network) -> Result<String, BtcError> {
    let params = network.params();
    let mut data = vec![1u8];
    data.extend(bech32::convertbits(output_key, 8, 5, true)?);
    Ok(bech32::encode(params.hrp, &data, bech32::Variant::Bech32m)?)
}

/// Encodes a private key in Wallet Import Format.
pub fn encode_wif(private_key: &[u8; 32], network: Network, compressed: bool) -> String {
    let params = network.params();
    let mut payload = vec![params.wif_version];
    payload.extend_from_slice(private_key);
    if compressed {
        payload.push(0x01);
    }
    crypto_utils::base58::check_encode(&payload)
}

/// Computes the pubkey hash (HASH160) used to build P2PKH/P2WPKH scripts.
pub fn pubkey_hash(pubkey: &[u8]) -> [u8; 20] {
    hash160(pubkey)
}
