//! # wallet-core
//!
//! The orchestration layer tying a [`types::WalletDescriptor`] to the
//! `chain-btc` transaction engine: deriving the scripthashes a wallet's
//! funds could sit under, collecting its UTXOs from a [`ChainOracle`],
//! assembling and signing a spend, and broadcasting the result.

pub mod error;
pub mod types;

use chain_btc::assembler::{self, AssembledTransaction, SpendAuth, SpendRequest};
use chain_btc::oracle::{Balance, ChainOracle};
use chain_btc::script::{self, ScriptFamily};
use chain_btc::tx;
use chain_btc::utxo::{self, UtxoRecord};
use serde_json::Value;

use error::WalletError;
use types::{WalletDescriptor, WalletDescriptorJson};

/// Parses and validates a wallet descriptor from its persisted JSON form.
pub fn load_descriptor(json: &str) -> Result<WalletDescriptor, WalletError> {
    let parsed: WalletDescriptorJson = serde_json::from_str(json)?;
    WalletDescriptor::from_json(&parsed)
}

/// The scriptPubKeys (and their Electrum scripthashes) that could hold a
/// descriptor's funds. A legacy-keyed wallet (p2pkh/p2wpkh) is queried under
/// both its P2PKH and P2WPKH scriptPubKeys since either could have received
/// a deposit; every other family has exactly one possible scriptPubKey.
fn scripthashes_for(descriptor: &WalletDescriptor) -> Result<Vec<(String, Vec<u8>)>, WalletError> {
    match descriptor {
        WalletDescriptor::Single { family: ScriptFamily::P2pk, public_key, .. } => {
            let spk = script::spk_p2pk(public_key)?;
            Ok(vec![(utxo::scripthash(&spk), spk)])
        }
        WalletDescriptor::Single {
            family: ScriptFamily::P2pkh | ScriptFamily::P2wpkh,
            public_key,
            ..
        } => {
            let pubkey_hash = chain_btc::address::pubkey_hash(public_key);
            let pkh_spk = script::spk_p2pkh(&pubkey_hash);
            let wpkh_spk = script::spk_p2wpkh(&pubkey_hash);
            Ok(vec![
                (utxo::scripthash(&pkh_spk), pkh_spk),
                (utxo::scripthash(&wpkh_spk), wpkh_spk),
            ])
        }
        WalletDescriptor::Single { family: ScriptFamily::P2tr, public_key, .. } => {
            let output_key: [u8; 32] = public_key.as_slice().try_into().map_err(|_| {
                WalletError::InvalidWalletDescriptor("p2tr public key must be 32 bytes".into())
            })?;
            let spk = script::spk_p2tr(&output_key);
            Ok(vec![(utxo::scripthash(&spk), spk)])
        }
        WalletDescriptor::Single { family, .. } => Err(WalletError::InvalidWalletDescriptor(format!(
            "unsupported single-key family {family:?}"
        ))),
        WalletDescriptor::Multisig { redeem_script, .. } => {
            let script_hash = crypto_utils::hash::hash160(redeem_script);
            let spk = script::spk_p2sh(&script_hash);
            Ok(vec![(utxo::scripthash(&spk), spk)])
        }
    }
}

/// Queries the oracle for every scripthash a descriptor's funds could sit
/// under and merges the results into a flat UTXO list.
pub fn fetch_utxos<O: ChainOracle>(
    oracle: &mut O,
    descriptor: &WalletDescriptor,
) -> Result<Vec<UtxoRecord>, WalletError> {
    let mut utxos = Vec::new();

    for (scripthash, spk) in scripthashes_for(descriptor)? {
        let entries = oracle.list_unspent(&scripthash)?;
        for entry in entries {
            utxos.push(utxo_from_listunspent_entry(&entry, &spk)?);
        }
    }

    tracing::debug!(count = utxos.len(), "collected utxos for wallet descriptor");
    Ok(utxos)
}

/// Sums confirmed and unconfirmed balances across every scripthash a
/// descriptor's funds could sit under.
pub fn get_balance<O: ChainOracle>(oracle: &mut O, descriptor: &WalletDescriptor) -> Result<Balance, WalletError> {
    let mut confirmed_sat = 0u64;
    let mut unconfirmed_sat = 0i64;
    for (scripthash, _) in scripthashes_for(descriptor)? {
        let balance = oracle.get_balance(&scripthash)?;
        confirmed_sat += balance.confirmed_sat;
        unconfirmed_sat += balance.unconfirmed_sat;
    }
    Ok(Balance { confirmed_sat, unconfirmed_sat })
}

fn utxo_from_listunspent_entry(entry: &Value, script_pubkey: &[u8]) -> Result<UtxoRecord, WalletError> {
    let oracle_err = |field: &str| {
        WalletError::Engine(chain_btc::error::BtcError::OracleError(format!(
            "listunspent entry missing or malformed field: {field}"
        )))
    };
    let txid = entry.get("tx_hash").and_then(Value::as_str).ok_or_else(|| oracle_err("tx_hash"))?;
    let vout = entry.get("tx_pos").and_then(Value::as_u64).ok_or_else(|| oracle_err("tx_pos"))?;
    let amount_sat = entry.get("value").and_then(Value::as_u64).ok_or_else(|| oracle_err("value"))?;
    let confirmations = entry.get("height").and_then(Value::as_u64).unwrap_or(0);

    Ok(UtxoRecord {
        txid: txid.to_string(),
        vout: vout as u32,
        amount_sat,
        script_pubkey: script_pubkey.to_vec(),
        confirmations,
    })
}

fn spend_auth(descriptor: &WalletDescriptor) -> SpendAuth {
    match descriptor {
        WalletDescriptor::Single { family: ScriptFamily::P2tr, private_key, .. } => {
            SpendAuth::Taproot { private_key: *private_key }
        }
        WalletDescriptor::Single { family, private_key, .. } => {
            SpendAuth::SingleKey { private_key: *private_key, family: *family }
        }
        WalletDescriptor::Multisig { participants, m, redeem_script, .. } => SpendAuth::Multisig {
            private_keys: participants.iter().map(|p| p.private_key).collect(),
            redeem_script: redeem_script.clone(),
            required: *m,
        },
    }
}

/// Collects UTXOs, resolves a fee rate (querying the oracle's 6-block
/// estimate when the caller doesn't supply one), and runs the engine's
/// fee-convergence loop to produce a signed transaction. Does not broadcast.
pub fn build_spend<O: ChainOracle>(
    oracle: &mut O,
    descriptor: &WalletDescriptor,
    destination_address: &str,
    amount_sat: u64,
    fee_rate_sat_per_vb: Option<f64>,
) -> Result<AssembledTransaction, WalletError> {
    let utxos = fetch_utxos(oracle, descriptor)?;
    let fee_rate = match fee_rate_sat_per_vb {
        Some(rate) => rate,
        None => oracle.estimate_fee_sat_per_vb(6)?,
    };

    let request = SpendRequest {
        auth: spend_auth(descriptor),
        utxos,
        destination_address: destination_address.to_string(),
        amount_sat,
        change_address: descriptor.address().to_string(),
        fee_rate_sat_per_vb: fee_rate,
        network: descriptor.network(),
        locktime: 0,
    };

    tracing::info!(
        destination = destination_address,
        amount_sat,
        fee_rate_sat_per_vb = fee_rate,
        "assembling spend"
    );
    Ok(assembler::assemble_and_sign(&request)?)
}

/// Consensus hex of an assembled transaction, ready for broadcast.
pub fn serialize_hex(transaction: &tx::Transaction) -> String {
    hex::encode(tx::serialize_witness(transaction))
}

/// Builds, signs, and broadcasts a spend in one call, returning the
/// resulting txid.
pub fn send<O: ChainOracle>(
    oracle: &mut O,
    descriptor: &WalletDescriptor,
    destination_address: &str,
    amount_sat: u64,
    fee_rate_sat_per_vb: Option<f64>,
) -> Result<String, WalletError> {
    let assembled = build_spend(oracle, descriptor, destination_address, amount_sat, fee_rate_sat_per_vb)?;
    let raw_hex = serialize_hex(&assembled.transaction);
    let txid = oracle.broadcast(&raw_hex)?;
    tracing::info!(txid, fee_sat = assembled.fee_sat, vsize = assembled.vsize, "broadcast spend");
    Ok(txid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_btc::error::BtcError;
    use std::collections::VecDeque;

    /// A scripted `ChainOracle` double: each method pulls its next scripted
    /// response off a queue, so tests can exercise retry/merge/broadcast
    /// logic without a live Electrum server.
    #[derive(Default)]
    struct MockOracle {
        unspent_by_scripthash: std::collections::HashMap<String, Vec<Value>>,
        balance_by_scripthash: std::collections::HashMap<String, Balance>,
        fee_rate: f64,
        broadcast_responses: VecDeque<Result<String, String>>,
    }

    impl ChainOracle for MockOracle {
        fn get_balance(&mut self, scripthash: &str) -> Result<Balance, BtcError> {
            Ok(self.balance_by_scripthash.get(scripthash).copied().unwrap_or(Balance {
                confirmed_sat: 0,
                unconfirmed_sat: 0,
            }))
        }
        fn list_unspent(&mut self, scripthash: &str) -> Result<Vec<Value>, BtcError> {
            Ok(self.unspent_by_scripthash.get(scripthash).cloned().unwrap_or_default())
        }
        fn get_transaction_hex(&mut self, _txid: &str) -> Result<String, BtcError> {
            unimplemented!("not exercised by these tests")
        }
        fn estimate_fee_sat_per_vb(&mut self, _target_blocks: u32) -> Result<f64, BtcError> {
            Ok(self.fee_rate)
        }
        fn broadcast(&mut self, _raw_tx_hex: &str) -> Result<String, BtcError> {
            match self.broadcast_responses.pop_front() {
                Some(Ok(txid)) => Ok(txid),
                Some(Err(e)) => Err(BtcError::OracleError(e)),
                None => Err(BtcError::OracleError("no scripted response".into())),
            }
        }
    }

    fn p2wpkh_descriptor_json() -> String {
        let private_key = [0x11u8; 32];
        let scalar = chain_btc::signer::scalar_from_private_key(&private_key).unwrap();
        let pubkey = chain_btc::signer::public_key_compressed(&scalar);
        serde_json::json!({
            "network": "regtest",
            "script_type": "p2wpkh",
            "private_key_hex": hex::encode(private_key),
            "public_key_hex": hex::encode(pubkey),
        })
        .to_string()
    }

    #[test]
    fn loads_descriptor_from_json_string() {
        let descriptor = load_descriptor(&p2wpkh_descriptor_json()).unwrap();
        assert!(descriptor.address().starts_with("bcrt1"));
    }

    #[test]
    fn fetch_utxos_merges_pkh_and_wpkh_scripthashes() {
        let descriptor = load_descriptor(&p2wpkh_descriptor_json()).unwrap();
        let (scripthash_pkh, _) = scripthashes_for(&descriptor).unwrap()[0].clone();
        let (scripthash_wpkh, spk_wpkh) = scripthashes_for(&descriptor).unwrap()[1].clone();

        let mut oracle = MockOracle::default();
        oracle.unspent_by_scripthash.insert(
            scripthash_pkh,
            vec![serde_json::json!({"tx_hash": "aa".repeat(32), "tx_pos": 0, "value": 10_000, "height": 100})],
        );
        oracle.unspent_by_scripthash.insert(
            scripthash_wpkh,
            vec![serde_json::json!({"tx_hash": "bb".repeat(32), "tx_pos": 1, "value": 20_000, "height": 0})],
        );

        let utxos = fetch_utxos(&mut oracle, &descriptor).unwrap();
        assert_eq!(utxos.len(), 2);
        assert!(utxos.iter().any(|u| u.script_pubkey == spk_wpkh && u.confirmations == 0));
    }

    #[test]
    fn build_spend_uses_supplied_fee_rate_over_oracle_estimate() {
        let descriptor = load_descriptor(&p2wpkh_descriptor_json()).unwrap();
        let (scripthash, spk) = scripthashes_for(&descriptor).unwrap()[1].clone();

        let mut oracle = MockOracle { fee_rate: 99.0, ..Default::default() };
        oracle.unspent_by_scripthash.insert(
            scripthash,
            vec![serde_json::json!({"tx_hash": "cc".repeat(32), "tx_pos": 0, "value": 200_000, "height": 10})],
        );
        let _ = &spk;

        let assembled = build_spend(&mut oracle, &descriptor, descriptor.address(), 50_000, Some(1.0)).unwrap();
        assert!(assembled.fee_sat < 1_000, "fee should reflect the supplied 1 sat/vB rate, not the 99 sat/vB estimate");
    }

    #[test]
    fn get_balance_sums_across_both_scripthashes() {
        let descriptor = load_descriptor(&p2wpkh_descriptor_json()).unwrap();
        let (scripthash_pkh, _) = scripthashes_for(&descriptor).unwrap()[0].clone();
        let (scripthash_wpkh, _) = scripthashes_for(&descriptor).unwrap()[1].clone();

        let mut oracle = MockOracle::default();
        oracle
            .balance_by_scripthash
            .insert(scripthash_pkh, Balance { confirmed_sat: 10_000, unconfirmed_sat: 0 });
        oracle
            .balance_by_scripthash
            .insert(scripthash_wpkh, Balance { confirmed_sat: 5_000, unconfirmed_sat: -1_000 });

        let balance = get_balance(&mut oracle, &descriptor).unwrap();
        assert_eq!(balance.confirmed_sat, 15_000);
        assert_eq!(balance.unconfirmed_sat, -1_000);
    }

    #[test]
    fn send_broadcasts_assembled_transaction_and_returns_txid() {
        let descriptor = load_descriptor(&p2wpkh_descriptor_json()).unwrap();
        let (scripthash, _) = scripthashes_for(&descriptor).unwrap()[1].clone();

        let mut oracle = MockOracle { fee_rate: 1.0, ..Default::default() };
        oracle.unspent_by_scripthash.insert(
            scripthash,
            vec![serde_json::json!({"tx_hash": "dd".repeat(32), "tx_pos": 0, "value": 200_000, "height": 10})],
        );
        oracle.broadcast_responses.push_back(Ok("ff".repeat(32)));

        let txid = send(&mut oracle, &descriptor, descriptor.address(), 50_000, Some(1.0)).unwrap();
        assert_eq!(txid, "ff".repeat(32));
    }
}
