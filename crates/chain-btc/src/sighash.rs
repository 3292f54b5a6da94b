//! Signature-hash computation: legacy (pre-SegWit), BIP-143 (witness v0),
//! and BIP-341 (Taproot key-path).

use crypto_utils::hash::{sha256, sha256d, tagged_hash};
use crypto_utils::varint;

use crate::constants::SIGHASH_ALL;
use crate::tx::{Transaction, TxOut};

/// Computes the legacy sighash for input `input_index`: every scriptSig is
/// blanked except the one being signed, which is set to `script_code`
/// (the prevout's scriptPubKey, or the redeem script for P2SH). The sighash
/// type is appended as a 4-byte little-endian trailer before `sha256d`.
pub fn legacy_sighash(tx: &Transaction, input_index: usize, script_code: &[u8], sighash_type: u8) -> [u8; 32] {
    let mut shadow = tx.clone();
    for (i, input) in shadow.inputs.iter_mut().enumerate() {
        input.script_sig = if i == input_index { script_code.to_vec() } else { Vec::new() };
        input.witness.clear();
    }
    let mut preimage = crate::tx::serialize_stripped(&shadow);
    preimage.extend_from_slice(&(sighash_type as u32).to_le_bytes());
    sha256d(&preimage)
}

fn hash_prevouts(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::new();
    for input in &tx.inputs {
        let mut txid_le = input.txid;
        txid_le.reverse();
        buf.extend_from_slice(&txid_le);
        buf.extend_from_slice(&input.vout.to_le_bytes());
    }
    sha256d(&buf)
}

fn hash_sequence(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::new();
    for input in &tx.inputs {
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    sha256d(&buf)
}

fn hash_outputs(outputs: &[TxOut]) -> [u8; 32] {
    let mut buf = Vec::new();
    for out in outputs {
        buf.extend_from_slice(&out.value_sat.to_le_bytes());
        buf.extend(varint::encode(out.script_pubkey.len() as u64));
        buf.extend_from_slice(&out.script_pubkey);
    }
    sha256d(&buf)
}

/// Computes the BIP-143 witness v0 sighash for a P2WPKH input.
///
/// `script_code` is the P2PKH-shaped script derived from the input's pubkey
/// hash (`OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`), not the
/// P2WPKH scriptPubKey itself.
pub fn bip143_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    input_amount_sat: u64,
    sighash_type: u8,
) -> [u8; 32] {
    let input = &tx.inputs[input_index];
    let mut preimage = Vec::new();
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts(tx));
    preimage.extend_from_slice(&hash_sequence(tx));

    let mut txid_le = input.txid;
    txid_le.reverse();
    preimage.extend_from_slice(&txid_le);
    preimage.extend_from_slice(&input.vout.to_le_bytes());

    preimage.extend(varint::encode(script_code.len() as u64));
    preimage.extend_from_slice(script_code);
    preimage.extend_from_slice(&input_amount_sat.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());

    preimage.extend_from_slice(&hash_outputs(&tx.outputs));
    preimage.extend_from_slice(&tx.locktime.to_le_bytes());
    preimage.extend_from_slice(&(sighash_type as u32).to_le_bytes());

    sha256d(&preimage)
}

/// Per-input context the Taproot sighash needs for every input in the
/// transaction, not just the one being signed — BIP-341 hashes the genuine
/// amount and scriptPubKey of every prevout, not a repeated placeholder.
#[derive(Debug, Clone)]
pub struct PrevoutInfo {
    pub amount_sat: u64,
    pub script_pubkey: Vec<u8>,
}

/// Computes the BIP-341 key-path sighash (`SIGHASH_DEFAULT`/`SIGHASH_ALL`,
/// no `ANYONECANPAY`, no annex).
pub fn taproot_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[PrevoutInfo],
    sighash_type: u8,
) -> [u8; 32] {
    let mut sha_amounts = Vec::new();
    let mut sha_scriptpubkeys = Vec::new();
    for p in prevouts {
        sha_amounts.extend_from_slice(&p.amount_sat.to_le_bytes());
        sha_scriptpubkeys.extend(varint::encode(p.script_pubkey.len() as u64));
        sha_scriptpubkeys.extend_from_slice(&p.script_pubkey);
    }

    let mut sig_msg = Vec::new();
    sig_msg.push(0x00); // epoch
    sig_msg.push(sighash_type);
    sig_msg.extend_from_slice(&tx.version.to_le_bytes());
    sig_msg.extend_from_slice(&tx.locktime.to_le_bytes());

    sig_msg.extend_from_slice(&sha256(&prevout_outpoints(tx)));
    sig_msg.extend_from_slice(&sha256(&sha_amounts));
    sig_msg.extend_from_slice(&sha256(&sha_scriptpubkeys));
    sig_msg.extend_from_slice(&sha256(&sequence_bytes(tx)));

    let effective_type = sighash_type & 0x03;
    if effective_type == crate::constants::SIGHASH_DEFAULT || effective_type == SIGHASH_ALL {
        sig_msg.extend_from_slice(&hash_outputs_single_sha(&tx.outputs));
    }

    let spend_type = 0u8; // key-path spend, no annex
    sig_msg.push(spend_type);
    sig_msg.extend_from_slice(&(input_index as u32).to_le_bytes());

    tagged_hash("TapSighash", &sig_msg)
}

fn prevout_outpoints(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    for input in &tx.inputs {
        let mut txid_le = input.txid;
        txid_le.reverse();
        buf.extend_from_slice(&txid_le);
        buf.extend_from_slice(&input.vout.to_le_bytes());
    }
    buf
}

fn sequence_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    for input in &tx.inputs {
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    buf
}

fn hash_outputs_single_sha(outputs: &[TxOut]) -> [u8; 32] {
    let mut buf = Vec::new();
    for out in outputs {
        buf.extend_from_slice(&out.value_sat.to_le_bytes());
        buf.extend(varint::encode(out.script_pubkey.len() as u64));
        buf.extend_from_slice(&out.script_pubkey);
    }
    sha256(&buf)
}
