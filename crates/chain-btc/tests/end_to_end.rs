//! Literal end-to-end scenarios exercising the full build/sign pipeline
//! across script families, plus the cross-cutting round-trip and
//! fee-convergence properties the unit tests don't cover at this level.

use chain_btc::assembler::{self, SpendAuth, SpendRequest};
use chain_btc::network::Network;
use chain_btc::script::{self, ScriptFamily};
use chain_btc::signer;
use chain_btc::tx;
use chain_btc::utxo::UtxoRecord;
use chain_btc::{address, constants};

fn hex_to_32(s: &str) -> [u8; 32] {
    let bytes = hex::decode(s).unwrap();
    bytes.try_into().unwrap()
}

#[test]
fn p2pkh_regtest_spend() {
    let private_key =
        signer::scalar_from_private_key(&hex_to_32("18e14a7b6a307f426a94f8114701e7c8e774e7f9a47e2c2035db29a206321725")).unwrap();
    let pubkey = signer::public_key_compressed(&private_key);
    let pubkey_hash = address::pubkey_hash(&pubkey);

    let funding = UtxoRecord {
        txid: "11".repeat(32),
        vout: 0,
        amount_sat: 100_000,
        script_pubkey: script::spk_p2pkh(&pubkey_hash),
        confirmations: 6,
    };

    let change_address = address::encode_p2pkh_address(&pubkey_hash, Network::Regtest);
    let dest_address = "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn".to_string();

    let request = SpendRequest {
        auth: SpendAuth::SingleKey { private_key, family: ScriptFamily::P2pkh },
        utxos: vec![funding],
        destination_address: dest_address,
        amount_sat: 10_000,
        change_address,
        fee_rate_sat_per_vb: 1.0,
        network: Network::Regtest,
        locktime: 0,
    };

    let assembled = assembler::assemble_and_sign(&request).unwrap();
    assert_eq!(assembled.transaction.inputs.len(), 1);
    assert_eq!(assembled.transaction.outputs.len(), 2);
    assert!((assembled.vsize as i64 - 226).abs() <= 20, "vsize {} not close to 226", assembled.vsize);

    let raw = tx::serialize_witness(&assembled.transaction);
    let reparsed = tx::parse(&raw).unwrap();
    assert_eq!(reparsed, assembled.transaction);
    for output in &reparsed.outputs {
        script::family_from_spk(&output.script_pubkey).unwrap();
    }
}

#[test]
fn p2wpkh_mainnet_change_suppressed() {
    let private_key = signer::scalar_from_private_key(&[0x21u8; 32]).unwrap();
    let pubkey = signer::public_key_compressed(&private_key);
    let pubkey_hash = address::pubkey_hash(&pubkey);

    let funding = UtxoRecord {
        txid: "22".repeat(32),
        vout: 0,
        amount_sat: 600,
        script_pubkey: script::spk_p2wpkh(&pubkey_hash),
        confirmations: 6,
    };

    let change_address = address::encode_p2wpkh_address(&pubkey_hash, Network::Mainnet).unwrap();
    let dest_address = address::encode_p2wpkh_address(&[0x55u8; 20], Network::Mainnet).unwrap();

    let request = SpendRequest {
        auth: SpendAuth::SingleKey { private_key, family: ScriptFamily::P2wpkh },
        utxos: vec![funding],
        destination_address: dest_address,
        amount_sat: 50,
        change_address,
        fee_rate_sat_per_vb: 1.0,
        network: Network::Mainnet,
        locktime: 0,
    };

    let assembled = assembler::assemble_and_sign(&request).unwrap();
    assert_eq!(assembled.transaction.outputs.len(), 1, "change below dust must be suppressed");

    let raw = tx::serialize_witness(&assembled.transaction);
    assert_eq!(&raw[4..6], &[0x00, 0x01], "witness form must carry the marker/flag pair");
}

#[test]
fn p2sh_two_of_three_multisig() {
    let keys: Vec<_> = [0x31u8, 0x32, 0x33]
        .iter()
        .map(|b| signer::scalar_from_private_key(&[*b; 32]).unwrap())
        .collect();
    let mut pubkeys: Vec<Vec<u8>> = keys.iter().map(|k| signer::public_key_compressed(k).to_vec()).collect();
    signer::bip67_sort(&mut pubkeys);

    let redeem_script = script::build_redeem_script_multisig(2, &pubkeys).unwrap();
    assert_eq!(redeem_script[0], 0x52);
    assert_eq!(redeem_script[redeem_script.len() - 2], 0x53);
    assert_eq!(redeem_script[redeem_script.len() - 1], script::OP_CHECKMULTISIG);

    let script_hash = crypto_utils::hash::hash160(&redeem_script);
    let funding_spk = script::spk_p2sh(&script_hash);
    let funding = UtxoRecord {
        txid: "33".repeat(32),
        vout: 0,
        amount_sat: 100_000,
        script_pubkey: funding_spk,
        confirmations: 6,
    };

    let address = address::encode_p2sh_address(&script_hash, Network::Regtest);
    let dest_address = address.clone();

    let request = SpendRequest {
        auth: SpendAuth::Multisig { private_keys: keys, redeem_script: redeem_script.clone(), required: 2 },
        utxos: vec![funding],
        destination_address: dest_address,
        amount_sat: 50_000,
        change_address: address,
        fee_rate_sat_per_vb: 1.0,
        network: Network::Regtest,
        locktime: 0,
    };

    let assembled = assembler::assemble_and_sign(&request).unwrap();
    let script_sig = &assembled.transaction.inputs[0].script_sig;
    assert_eq!(script_sig[0], script::OP_0);

    let (_, _, parsed_pubkeys) = script::parse_redeem_script_multisig(&redeem_script).unwrap();
    assert_eq!(parsed_pubkeys, pubkeys, "redeem script pubkey order must match the sorted order");
}

#[test]
fn p2tr_key_path_spend() {
    let private_key = signer::scalar_from_private_key(&[0x41u8; 32]).unwrap();
    let internal_pubkey = signer::public_key_compressed(&private_key);
    let internal_x: [u8; 32] = internal_pubkey[1..].try_into().unwrap();
    let output_key = signer::taproot_output_key(&internal_x).unwrap();

    let funding_spk = script::spk_p2tr(&output_key);
    assert_eq!(&funding_spk[..2], &[0x51, 0x20]);

    let funding = UtxoRecord {
        txid: "44".repeat(32),
        vout: 0,
        amount_sat: 100_000,
        script_pubkey: funding_spk,
        confirmations: 6,
    };

    let address = address::encode_p2tr_address(&output_key, Network::Regtest).unwrap();

    let request = SpendRequest {
        auth: SpendAuth::Taproot { private_key },
        utxos: vec![funding],
        destination_address: address.clone(),
        amount_sat: 50_000,
        change_address: address,
        fee_rate_sat_per_vb: 1.0,
        network: Network::Regtest,
        locktime: 0,
    };

    let assembled = assembler::assemble_and_sign(&request).unwrap();
    let witness = &assembled.transaction.inputs[0].witness;
    assert_eq!(witness.len(), 1);
    assert_eq!(witness[0].len(), 64);
}

#[test]
fn fee_convergence_terminates_quickly_for_a_simple_p2pkh_spend() {
    let private_key = signer::scalar_from_private_key(&[0x51u8; 32]).unwrap();
    let pubkey = signer::public_key_compressed(&private_key);
    let pubkey_hash = address::pubkey_hash(&pubkey);

    let funding = UtxoRecord {
        txid: "55".repeat(32),
        vout: 0,
        amount_sat: 100_000,
        script_pubkey: script::spk_p2pkh(&pubkey_hash),
        confirmations: 6,
    };

    let change_address = address::encode_p2pkh_address(&pubkey_hash, Network::Regtest);
    let dest_address = address::encode_p2pkh_address(&[0x66u8; 20], Network::Regtest);
    let fee_rate = 1.0;

    let request = SpendRequest {
        auth: SpendAuth::SingleKey { private_key, family: ScriptFamily::P2pkh },
        utxos: vec![funding],
        destination_address: dest_address,
        amount_sat: 50_000,
        change_address,
        fee_rate_sat_per_vb: fee_rate,
        network: Network::Regtest,
        locktime: 0,
    };

    assert_eq!(constants::INITIAL_FEE_SAT, 200);
    let assembled = assembler::assemble_and_sign(&request).unwrap();
    let expected_fee = (assembled.vsize as f64 * fee_rate).ceil() as u64;
    assert!(
        (assembled.fee_sat as i64 - expected_fee as i64).abs() <= 1,
        "fee {} should be within one satoshi of vsize*rate {}",
        assembled.fee_sat,
        expected_fee
    );
}

#[test]
fn single_utxo_exactly_covering_target_and_fee_has_no_change() {
    let private_key = signer::scalar_from_private_key(&[0x61u8; 32]).unwrap();
    let pubkey = signer::public_key_compressed(&private_key);
    let pubkey_hash = address::pubkey_hash(&pubkey);

    // P2WPKH single-input, single-output vsize is ~110 vB; fund exactly
    // target + that fee so no change output is produced.
    let amount_sat = 50_000u64;
    let approx_fee = 110u64;
    let funding = UtxoRecord {
        txid: "66".repeat(32),
        vout: 0,
        amount_sat: amount_sat + approx_fee,
        script_pubkey: script::spk_p2wpkh(&pubkey_hash),
        confirmations: 6,
    };

    let change_address = address::encode_p2wpkh_address(&pubkey_hash, Network::Regtest).unwrap();
    let dest_address = address::encode_p2wpkh_address(&[0x77u8; 20], Network::Regtest).unwrap();

    let request = SpendRequest {
        auth: SpendAuth::SingleKey { private_key, family: ScriptFamily::P2wpkh },
        utxos: vec![funding],
        destination_address: dest_address,
        amount_sat,
        change_address,
        fee_rate_sat_per_vb: 1.0,
        network: Network::Regtest,
        locktime: 0,
    };

    let assembled = assembler::assemble_and_sign(&request).unwrap();
    assert_eq!(assembled.transaction.outputs.len(), 1);
}

#[test]
fn multisig_rejects_seventeen_of_seventeen() {
    let pubkeys: Vec<Vec<u8>> = (0u8..17)
        .map(|i| {
            let key = signer::scalar_from_private_key(&[i.wrapping_add(1); 32]).unwrap();
            signer::public_key_compressed(&key).to_vec()
        })
        .collect();
    assert!(script::build_redeem_script_multisig(17, &pubkeys).is_err());
}
