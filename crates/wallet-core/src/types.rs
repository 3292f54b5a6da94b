//! The wallet descriptor: a tagged record carrying private key material, the
//! derived public key, the canonical address, and (for p2sh-multisig) the
//! participant set. Loaded once per run from the persisted JSON shape and
//! immutable thereafter.

use k256::Scalar;
use serde::Deserialize;
use zeroize::Zeroize;

use chain_btc::network::Network;
use chain_btc::script::ScriptFamily;
use chain_btc::{address, script, signer};

use crate::error::WalletError;

/// The `script_type` tag in persisted wallet-descriptor JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptType {
    P2pk,
    P2pkh,
    P2wpkh,
    P2shMultisig,
    P2tr,
}

/// One entry of the `participants` array in a p2sh-multisig descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantJson {
    pub private_key_hex: String,
    pub public_key_hex: String,
    #[serde(default)]
    pub private_key_wif: Option<String>,
}

/// The raw persisted JSON shape from the external wallet store (engine
/// consumes this via `serde::Deserialize`; it never reads or writes the file
/// itself).
#[derive(Debug, Clone, Deserialize)]
pub struct WalletDescriptorJson {
    pub network: String,
    pub script_type: ScriptType,
    #[serde(default)]
    pub private_key_hex: Option<String>,
    #[serde(default)]
    pub public_key_hex: Option<String>,
    #[serde(default)]
    pub internal_pubkey_x_hex: Option<String>,
    #[serde(default)]
    pub private_key_wif: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub m: Option<usize>,
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub redeem_script_hex: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<ParticipantJson>>,
}

/// One resolved participant key in a loaded multisig descriptor.
#[derive(Debug, Clone)]
pub struct Participant {
    pub private_key: Scalar,
    pub public_key: Vec<u8>,
}

/// The validated, in-memory wallet descriptor this engine operates on.
#[derive(Debug, Clone)]
pub enum WalletDescriptor {
    Single {
        network: Network,
        family: ScriptFamily,
        private_key: Scalar,
        public_key: Vec<u8>,
        address: String,
    },
    Multisig {
        network: Network,
        participants: Vec<Participant>,
        m: usize,
        n: usize,
        redeem_script: Vec<u8>,
        address: String,
    },
}

impl WalletDescriptor {
    pub fn network(&self) -> Network {
        match self {
            WalletDescriptor::Single { network, .. } => *network,
            WalletDescriptor::Multisig { network, .. } => *network,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            WalletDescriptor::Single { address, .. } => address,
            WalletDescriptor::Multisig { address, .. } => address,
        }
    }

    pub fn family(&self) -> ScriptFamily {
        match self {
            WalletDescriptor::Single { family, .. } => *family,
            WalletDescriptor::Multisig { .. } => ScriptFamily::P2sh,
        }
    }

    /// Loads and validates a descriptor from its persisted JSON form,
    /// enforcing the invariants named in the data model: a single declared
    /// family, a private key derivation that matches the stored public key
    /// material, and (for multisig) a redeem script consistent with the
    /// participant set.
    pub fn from_json(json: &WalletDescriptorJson) -> Result<Self, WalletError> {
        let network = parse_network(&json.network)?;

        match json.script_type {
            ScriptType::P2pk | ScriptType::P2pkh | ScriptType::P2wpkh => {
                load_single(json, network, family_for(json.script_type))
            }
            ScriptType::P2tr => load_taproot(json, network),
            ScriptType::P2shMultisig => load_multisig(json, network),
        }
    }
}

fn family_for(script_type: ScriptType) -> ScriptFamily {
    match script_type {
        ScriptType::P2pk => ScriptFamily::P2pk,
        ScriptType::P2pkh => ScriptFamily::P2pkh,
        ScriptType::P2wpkh => ScriptFamily::P2wpkh,
        ScriptType::P2tr => ScriptFamily::P2tr,
        ScriptType::P2shMultisig => ScriptFamily::P2sh,
    }
}

fn parse_network(tag: &str) -> Result<Network, WalletError> {
    match tag {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        "regtest" => Ok(Network::Regtest),
        other => Err(WalletError::InvalidWalletDescriptor(format!(
            "unknown network tag: {other}"
        ))),
    }
}

fn decode_private_key_hex(field_name: &str, hex_str: &str) -> Result<Scalar, WalletError> {
    let decoded = hex::decode(hex_str).map_err(|e| {
        WalletError::InvalidWalletDescriptor(format!("{field_name} is not valid hex: {e}"))
    })?;
    let bytes = crypto_utils::zeroizing::ZeroizingBytes::new(decoded);
    if bytes.len() != 32 {
        return Err(WalletError::InvalidWalletDescriptor(format!("{field_name} must be 32 bytes")));
    }
    let mut array = [0u8; 32];
    array.copy_from_slice(&bytes);
    let scalar = signer::scalar_from_private_key(&array);
    array.zeroize();
    Ok(scalar?)
}

fn require<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, WalletError> {
    field
        .as_deref()
        .ok_or_else(|| WalletError::InvalidWalletDescriptor(format!("missing {name}")))
}

fn load_single(
    json: &WalletDescriptorJson,
    network: Network,
    family: ScriptFamily,
) -> Result<WalletDescriptor, WalletError> {
    let private_key_hex = require(&json.private_key_hex, "private_key_hex")?;
    let private_key = decode_private_key_hex("private_key_hex", private_key_hex)?;
    let derived_public_key = signer::public_key_compressed(&private_key);

    if family != ScriptFamily::P2pk {
        let stored_hex = require(&json.public_key_hex, "public_key_hex")?;
        let stored = hex::decode(stored_hex).map_err(|e| {
            WalletError::InvalidWalletDescriptor(format!("public_key_hex is not valid hex: {e}"))
        })?;
        if stored != derived_public_key {
            return Err(WalletError::InvalidWalletDescriptor(
                "public_key_hex does not match the key derived from private_key_hex".into(),
            ));
        }
    }

    let pubkey_hash = address::pubkey_hash(&derived_public_key);
    let derived_address = match family {
        ScriptFamily::P2pk => None,
        ScriptFamily::P2pkh => Some(address::encode_p2pkh_address(&pubkey_hash, network)),
        ScriptFamily::P2wpkh => Some(address::encode_p2wpkh_address(&pubkey_hash, network)?),
        _ => unreachable!("load_single only handles p2pk/p2pkh/p2wpkh"),
    };

    let resolved_address = match (&json.address, derived_address) {
        (Some(stored), Some(derived)) if *stored != derived => {
            return Err(WalletError::InvalidWalletDescriptor(format!(
                "address {stored} does not match the address derived from the key material"
            )));
        }
        (Some(stored), _) => stored.clone(),
        (None, Some(derived)) => derived,
        (None, None) => String::new(),
    };

    Ok(WalletDescriptor::Single {
        network,
        family,
        private_key,
        public_key: derived_public_key.to_vec(),
        address: resolved_address,
    })
}

fn load_taproot(json: &WalletDescriptorJson, network: Network) -> Result<WalletDescriptor, WalletError> {
    let private_key_hex = require(&json.private_key_hex, "private_key_hex")?;
    let private_key = decode_private_key_hex("private_key_hex", private_key_hex)?;

    let internal_public_key = signer::public_key_compressed(&private_key);
    let internal_x: [u8; 32] = internal_public_key[1..].try_into().expect("33-byte compressed key");

    if let Some(stored_hex) = &json.internal_pubkey_x_hex {
        let stored = hex::decode(stored_hex).map_err(|e| {
            WalletError::InvalidWalletDescriptor(format!("internal_pubkey_x_hex is not valid hex: {e}"))
        })?;
        if stored != internal_x {
            return Err(WalletError::InvalidWalletDescriptor(
                "internal_pubkey_x_hex does not match the key derived from private_key_hex".into(),
            ));
        }
    }

    let output_key = signer::taproot_output_key(&internal_x)?;
    let derived_address = address::encode_p2tr_address(&output_key, network)?;

    let resolved_address = match &json.address {
        Some(stored) if *stored != derived_address => {
            return Err(WalletError::InvalidWalletDescriptor(format!(
                "address {stored} does not match the BIP-341 tweak of the internal key"
            )));
        }
        Some(stored) => stored.clone(),
        None => derived_address,
    };

    Ok(WalletDescriptor::Single {
        network,
        family: ScriptFamily::P2tr,
        private_key,
        public_key: output_key.to_vec(),
        address: resolved_address,
    })
}

fn load_multisig(json: &WalletDescriptorJson, network: Network) -> Result<WalletDescriptor, WalletError> {
    let participants_json = json.participants.as_ref().ok_or_else(|| {
        WalletError::InvalidWalletDescriptor("missing participants".into())
    })?;
    let m = json.m.ok_or_else(|| WalletError::InvalidWalletDescriptor("missing m".into()))?;
    let n = json.n.ok_or_else(|| WalletError::InvalidWalletDescriptor("missing n".into()))?;

    if participants_json.len() != n {
        return Err(WalletError::InvalidWalletDescriptor(format!(
            "participants.length ({}) must equal n ({n})",
            participants_json.len()
        )));
    }
    if m == 0 || m > n || n > 16 {
        return Err(WalletError::InvalidWalletDescriptor(format!(
            "multisig requires 1 <= m <= n <= 16, got m={m} n={n}"
        )));
    }

    let mut participants = Vec::with_capacity(participants_json.len());
    let mut public_keys = Vec::with_capacity(participants_json.len());
    for (i, p) in participants_json.iter().enumerate() {
        let private_key = decode_private_key_hex("participants[].private_key_hex", &p.private_key_hex)?;
        let derived = signer::public_key_compressed(&private_key);
        let stored = hex::decode(&p.public_key_hex).map_err(|e| {
            WalletError::InvalidWalletDescriptor(format!(
                "participants[{i}].public_key_hex is not valid hex: {e}"
            ))
        })?;
        if stored != derived {
            return Err(WalletError::InvalidWalletDescriptor(format!(
                "participants[{i}].public_key_hex does not match its private key"
            )));
        }
        public_keys.push(derived.to_vec());
        participants.push(Participant { private_key, public_key: derived.to_vec() });
    }

    let redeem_script_hex = require(&json.redeem_script_hex, "redeem_script_hex")?;
    let redeem_script = hex::decode(redeem_script_hex).map_err(|e| {
        WalletError::InvalidWalletDescriptor(format!("redeem_script_hex is not valid hex: {e}"))
    })?;

    let (parsed_m, parsed_n) = (m as u8, n as u8);
    let mut sorted_participant_keys = public_keys.clone();
    signer::bip67_sort(&mut sorted_participant_keys);
    let (script_m, script_n, script_pubkeys) = script::parse_redeem_script_multisig(&redeem_script)?;
    if script_m != parsed_m || script_n != parsed_n {
        return Err(WalletError::InvalidWalletDescriptor(
            "redeem_script_hex m/n does not match the declared m/n".into(),
        ));
    }
    if script_pubkeys != sorted_participant_keys {
        return Err(WalletError::InvalidWalletDescriptor(
            "redeem_script_hex pubkey order does not match the BIP-67 sorted participant set".into(),
        ));
    }

    let script_hash = crypto_utils::hash::hash160(&redeem_script);
    let derived_address = address::encode_p2sh_address(&script_hash, network);

    let resolved_address = match &json.address {
        Some(stored) if *stored != derived_address => {
            return Err(WalletError::InvalidWalletDescriptor(format!(
                "address {stored} does not match hash160(redeem_script)"
            )));
        }
        Some(stored) => stored.clone(),
        None => derived_address,
    };

    Ok(WalletDescriptor::Multisig {
        network,
        participants,
        m,
        n,
        redeem_script,
        address: resolved_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_descriptor_json(script_type: ScriptType, network: &str) -> WalletDescriptorJson {
        let private_key = [0x21u8; 32];
        let scalar = signer::scalar_from_private_key(&private_key).unwrap();
        let pubkey = signer::public_key_compressed(&scalar);
        WalletDescriptorJson {
            network: network.into(),
            script_type,
            private_key_hex: Some(hex::encode(private_key)),
            public_key_hex: Some(hex::encode(pubkey)),
            internal_pubkey_x_hex: None,
            private_key_wif: None,
            address: None,
            m: None,
            n: None,
            redeem_script_hex: None,
            participants: None,
        }
    }

    #[test]
    fn loads_p2wpkh_descriptor_and_derives_address() {
        let json = single_descriptor_json(ScriptType::P2wpkh, "regtest");
        let descriptor = WalletDescriptor::from_json(&json).unwrap();
        assert!(descriptor.address().starts_with("bcrt1"));
        assert_eq!(descriptor.family(), ScriptFamily::P2wpkh);
    }

    #[test]
    fn rejects_mismatched_public_key() {
        let mut json = single_descriptor_json(ScriptType::P2pkh, "mainnet");
        json.public_key_hex = Some(hex::encode([0x02u8; 33]));
        assert!(WalletDescriptor::from_json(&json).is_err());
    }

    #[test]
    fn loads_taproot_descriptor_with_tweaked_output_key() {
        let private_key = [0x33u8; 32];
        let json = WalletDescriptorJson {
            network: "mainnet".into(),
            script_type: ScriptType::P2tr,
            private_key_hex: Some(hex::encode(private_key)),
            public_key_hex: None,
            internal_pubkey_x_hex: None,
            private_key_wif: None,
            address: None,
            m: None,
            n: None,
            redeem_script_hex: None,
            participants: None,
        };
        let descriptor = WalletDescriptor::from_json(&json).unwrap();
        assert!(descriptor.address().starts_with("bc1p"));
    }

    #[test]
    fn loads_multisig_descriptor_two_of_three() {
        let keys: Vec<[u8; 32]> = vec![[0x01u8; 32], [0x02u8; 32], [0x03u8; 32]];
        let mut pubkeys: Vec<Vec<u8>> = keys
            .iter()
            .map(|k| {
                let scalar = signer::scalar_from_private_key(k).unwrap();
                signer::public_key_compressed(&scalar).to_vec()
            })
            .collect();
        signer::bip67_sort(&mut pubkeys);
        let redeem_script = script::build_redeem_script_multisig(2, &pubkeys).unwrap();

        let participants: Vec<ParticipantJson> = keys
            .iter()
            .map(|k| {
                let scalar = signer::scalar_from_private_key(k).unwrap();
                let pubkey = signer::public_key_compressed(&scalar);
                ParticipantJson {
                    private_key_hex: hex::encode(k),
                    public_key_hex: hex::encode(pubkey),
                    private_key_wif: None,
                }
            })
            .collect();

        let json = WalletDescriptorJson {
            network: "mainnet".into(),
            script_type: ScriptType::P2shMultisig,
            private_key_hex: None,
            public_key_hex: None,
            internal_pubkey_x_hex: None,
            private_key_wif: None,
            address: None,
            m: Some(2),
            n: Some(3),
            redeem_script_hex: Some(hex::encode(&redeem_script)),
            participants: Some(participants),
        };

        let descriptor = WalletDescriptor::from_json(&json).unwrap();
        match descriptor {
            WalletDescriptor::Multisig { m, n, participants, .. } => {
                assert_eq!(m, 2);
                assert_eq!(n, 3);
                assert_eq!(participants.len(), 3);
            }
            _ => panic!("expected a multisig descriptor"),
        }
    }

    #[test]
    fn rejects_n_mismatch_with_participants_length() {
        let mut json = single_descriptor_json(ScriptType::P2pkh, "mainnet");
        json.script_type = ScriptType::P2shMultisig;
        json.m = Some(1);
        json.n = Some(2);
        json.participants = Some(Vec::new());
        assert!(WalletDescriptor::from_json(&json).is_err());
    }

    #[test]
    fn rejects_unknown_network_tag() {
        let json = single_descriptor_json(ScriptType::P2pkh, "signet");
        assert!(WalletDescriptor::from_json(&json).is_err());
    }
}
