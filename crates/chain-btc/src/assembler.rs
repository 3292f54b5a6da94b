//! Transaction assembly: coin selection, the fee-convergence loop, signing,
//! and final serialization, tying together every other module in this crate.

use k256::Scalar;

use crate::address;
use crate::constants::{self, INITIAL_FEE_SAT, MAX_FEE_ITERATIONS};
use crate::error::BtcError;
use crate::network::Network;
use crate::script::{self, ScriptFamily};
use crate::sighash::{self, PrevoutInfo};
use crate::signer;
use crate::tx::{Transaction, TxIn, TxOut};
use crate::utxo::{self, UtxoRecord};

/// Key material (and, for multisig, redeem-script context) authorizing a spend.
#[derive(Debug, Clone)]
pub enum SpendAuth {
    /// P2PK, P2PKH, or P2WPKH: a single key signs every input.
    SingleKey { private_key: Scalar, family: ScriptFamily },
    /// P2SH-wrapped bare multisig: `required`-of-`public_keys.len()`.
    Multisig { private_keys: Vec<Scalar>, redeem_script: Vec<u8>, required: usize },
    /// P2TR key-path spend.
    Taproot { private_key: Scalar },
}

impl SpendAuth {
    fn family(&self) -> ScriptFamily {
        match self {
            SpendAuth::SingleKey { family, .. } => *family,
            SpendAuth::Multisig { .. } => ScriptFamily::P2sh,
            SpendAuth::Taproot { .. } => ScriptFamily::P2tr,
        }
    }
}

/// Everything needed to build and sign one spend.
#[derive(Debug, Clone)]
pub struct SpendRequest {
    pub auth: SpendAuth,
    pub utxos: Vec<UtxoRecord>,
    pub destination_address: String,
    pub amount_sat: u64,
    pub change_address: String,
    pub fee_rate_sat_per_vb: f64,
    pub network: Network,
    pub locktime: u32,
}

/// The outcome of a successful assembly: the final signed transaction, its
/// measured virtual size, and the fee actually paid.
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub transaction: Transaction,
    pub vsize: u64,
    pub fee_sat: u64,
}

fn placeholder_witness_item(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

/// Worst-case single-signature placeholder sizes used to seed the
/// fee-convergence loop's first measured skeleton, before real signatures
/// exist (DER signature up to 72 bytes + 1 sighash-type byte; compressed
/// pubkey 33 bytes; Schnorr signature always exactly 64 bytes).
const PLACEHOLDER_ECDSA_SIG_LEN: usize = 73;
const PLACEHOLDER_PUBKEY_LEN: usize = 33;
const PLACEHOLDER_SCHNORR_SIG_LEN: usize = 64;

fn build_input_placeholder(auth: &SpendAuth, redeem_script_len: usize) -> (Vec<u8>, Vec<Vec<u8>>) {
    match auth {
        SpendAuth::SingleKey { family: ScriptFamily::P2pk, .. } => {
            let script_sig = script::push_data(&placeholder_witness_item(PLACEHOLDER_ECDSA_SIG_LEN));
            (script_sig, Vec::new())
        }
        SpendAuth::SingleKey { family: ScriptFamily::P2pkh, .. } => {
            let mut script_sig = script::push_data(&placeholder_witness_item(PLACEHOLDER_ECDSA_SIG_LEN));
            script_sig.extend(script::push_data(&placeholder_witness_item(PLACEHOLDER_PUBKEY_LEN)));
            (script_sig, Vec::new())
        }
        SpendAuth::SingleKey { family: ScriptFamily::P2wpkh, .. } => {
            let witness = vec![
                placeholder_witness_item(PLACEHOLDER_ECDSA_SIG_LEN),
                placeholder_witness_item(PLACEHOLDER_PUBKEY_LEN),
            ];
            (Vec::new(), witness)
        }
        SpendAuth::SingleKey { family, .. } => {
            panic!("single-key auth does not support family {family:?}")
        }
        SpendAuth::Multisig { required, .. } => {
            let mut script_sig = vec![script::OP_0];
            for _ in 0..*required {
                script_sig.extend(script::push_data(&placeholder_witness_item(PLACEHOLDER_ECDSA_SIG_LEN)));
            }
            script_sig.extend(script::push_data(&placeholder_witness_item(redeem_script_len)));
            (script_sig, Vec::new())
        }
        SpendAuth::Taproot { .. } => {
            (Vec::new(), vec![placeholder_witness_item(PLACEHOLDER_SCHNORR_SIG_LEN)])
        }
    }
}

fn decode_spk(address: &str, network: Network) -> Result<Vec<u8>, BtcError> {
    let decoded = address::decode_address(address)?;
    address::build_spk_for(&decoded, network)
}

/// Runs the fee-convergence loop: builds a placeholder-signed skeleton,
/// measures its true vsize, derives the fee at the requested rate, and
/// re-selects coins/re-sizes the change output until the fee stabilizes
/// (or [`MAX_FEE_ITERATIONS`] is reached).
pub fn assemble_and_sign(request: &SpendRequest) -> Result<AssembledTransaction, BtcError> {
    let destination_spk = decode_spk(&request.destination_address, request.network)?;
    let change_spk = decode_spk(&request.change_address, request.network)?;

    let redeem_script_len = match &request.auth {
        SpendAuth::Multisig { redeem_script, .. } => redeem_script.len(),
        _ => 0,
    };

    let mut fee_sat = INITIAL_FEE_SAT;
    let mut last_fee = 0u64;
    let mut iterations = 0u32;

    let (selection, tx) = loop {
        iterations += 1;

        let selection = utxo::select_coins(
            &request.utxos,
            request.amount_sat + fee_sat,
            request.fee_rate_sat_per_vb,
            request.auth.family(),
            true,
        )?;

        let raw_change = selection
            .total_input_sat
            .saturating_sub(request.amount_sat + fee_sat);
        let has_change = !utxo::is_dust(raw_change);

        let mut outputs = vec![TxOut { value_sat: request.amount_sat, script_pubkey: destination_spk.clone() }];
        if has_change {
            outputs.push(TxOut { value_sat: raw_change, script_pubkey: change_spk.clone() });
        }

        let mut inputs = Vec::with_capacity(selection.selected.len());
        for utxo in &selection.selected {
            let mut txid = [0u8; 32];
            hex::decode_to_slice(&utxo.txid, &mut txid)
                .map_err(|_| BtcError::InvalidWalletDescriptor(format!("bad txid hex: {}", utxo.txid)))?;
            let mut input = TxIn::new(txid, utxo.vout);
            let (script_sig, witness) = build_input_placeholder(&request.auth, redeem_script_len);
            input.script_sig = script_sig;
            input.witness = witness;
            inputs.push(input);
        }

        let skeleton = Transaction { version: 1, inputs, outputs, locktime: request.locktime };
        let measured_vsize = crate::tx::vsize(&skeleton);
        let measured_fee = (measured_vsize as f64 * request.fee_rate_sat_per_vb).ceil() as u64;

        if measured_fee == last_fee || iterations >= MAX_FEE_ITERATIONS {
            break (selection, skeleton);
        }
        last_fee = measured_fee;
        fee_sat = measured_fee;
    };

    let signed = sign_inputs(&tx, &selection.selected, &request.auth, request.network)?;
    let vsize = crate::tx::vsize(&signed);
    let total_out: u64 = signed.outputs.iter().map(|o| o.value_sat).sum();
    let fee_sat = selection.total_input_sat.saturating_sub(total_out);

    Ok(AssembledTransaction { transaction: signed, vsize, fee_sat })
}

fn sign_inputs(
    skeleton: &Transaction,
    selected: &[UtxoRecord],
    auth: &SpendAuth,
    _network: Network,
) -> Result<Transaction, BtcError> {
    let mut signed = skeleton.clone();

    let prevouts: Vec<PrevoutInfo> = selected
        .iter()
        .map(|u| PrevoutInfo { amount_sat: u.amount_sat, script_pubkey: u.script_pubkey.clone() })
        .collect();

    for (index, utxo) in selected.iter().enumerate() {
        match auth {
            SpendAuth::SingleKey { private_key, family: ScriptFamily::P2pk } => {
                let sighash = sighash::legacy_sighash(skeleton, index, &utxo.script_pubkey, constants::SIGHASH_ALL);
                let sig = signer::ecdsa_sign_with_sighash_type(private_key, &sighash, constants::SIGHASH_ALL);
                signed.inputs[index].script_sig = script::push_data(&sig);
            }
            SpendAuth::SingleKey { private_key, family: ScriptFamily::P2pkh } => {
                let pubkey = signer::public_key_compressed(private_key);
                let sighash = sighash::legacy_sighash(skeleton, index, &utxo.script_pubkey, constants::SIGHASH_ALL);
                let sig = signer::ecdsa_sign_with_sighash_type(private_key, &sighash, constants::SIGHASH_ALL);
                let mut script_sig = script::push_data(&sig);
                script_sig.extend(script::push_data(&pubkey));
                signed.inputs[index].script_sig = script_sig;
            }
            SpendAuth::SingleKey { private_key, family: ScriptFamily::P2wpkh } => {
                let pubkey = signer::public_key_compressed(private_key);
                let pubkey_hash = address::pubkey_hash(&pubkey);
                let script_code = script::spk_p2pkh(&pubkey_hash);
                let sighash = sighash::bip143_sighash(
                    skeleton,
                    index,
                    &script_code,
                    utxo.amount_sat,
                    constants::SIGHASH_ALL,
                );
                let sig = signer::ecdsa_sign_with_sighash_type(private_key, &sighash, constants::SIGHASH_ALL);
                signed.inputs[index].witness = vec![sig, pubkey.to_vec()];
            }
            SpendAuth::SingleKey { family, .. } => {
                return Err(BtcError::InvalidWalletDescriptor(format!(
                    "single-key auth does not support family {family:?}"
                )));
            }
            SpendAuth::Multisig { private_keys, redeem_script, required } => {
                let (_, _, pubkeys) = script::parse_redeem_script_multisig(redeem_script)?;
                let sighash = sighash::legacy_sighash(skeleton, index, redeem_script, constants::SIGHASH_ALL);
                let mut script_sig = vec![script::OP_0];
                let mut matched = 0usize;
                for pubkey in &pubkeys {
                    if matched >= *required {
                        break;
                    }
                    let Some(key) = private_keys
                        .iter()
                        .find(|k| signer::public_key_compressed(k).as_slice() == pubkey.as_slice())
                    else {
                        continue;
                    };
                    let sig = signer::ecdsa_sign_with_sighash_type(key, &sighash, constants::SIGHASH_ALL);
                    script_sig.extend(script::push_data(&sig));
                    matched += 1;
                }
                if matched < *required {
                    return Err(BtcError::NotEnoughKeys { found: matched, required: *required });
                }
                script_sig.extend(script::push_data(redeem_script));
                signed.inputs[index].script_sig = script_sig;
            }
            SpendAuth::Taproot { private_key } => {
                let tweaked = signer::taproot_tweak_seckey(private_key);
                let sighash = sighash::taproot_sighash(skeleton, index, &prevouts, constants::SIGHASH_DEFAULT);
                let aux_rand = crypto_utils::random::random_bytes_fixed::<32>();
                let sig = signer::schnorr_sign(&tweaked, &sighash, &aux_rand);
                signed.inputs[index].witness = vec![sig.to_vec()];
            }
        }
    }

    Ok(signed)
}
