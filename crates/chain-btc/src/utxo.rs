use crypto_utils::hash::sha256;

use crate::constants::{self, input_vbytes};
use crate::error::BtcError;
use crate::script::ScriptFamily;

/// A single unspent output as reported by the chain oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoRecord {
    pub txid: String,
    pub vout: u32,
    pub amount_sat: u64,
    pub script_pubkey: Vec<u8>,
    pub confirmations: u64,
}

/// Derives the Electrum/Fulcrum "scripthash" for a scriptPubKey: SHA-256 of
/// the script, byte-reversed, hex-encoded. This is the subscription key the
/// protocol indexes UTXOs by.
pub fn scripthash(script_pubkey: &[u8]) -> String {
    let mut digest = sha256(script_pubkey);
    digest.reverse();
    hex::encode(digest)
}

fn estimated_input_vbytes(family: ScriptFamily) -> f64 {
    match family {
        ScriptFamily::P2pk => input_vbytes::P2PK,
        ScriptFamily::P2pkh => input_vbytes::P2PKH,
        ScriptFamily::P2sh => input_vbytes::P2SH_MULTISIG,
        ScriptFamily::P2wpkh => input_vbytes::P2WPKH,
        ScriptFamily::P2tr => input_vbytes::P2TR,
    }
}

/// Result of a successful coin selection.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub selected: Vec<UtxoRecord>,
    pub total_input_sat: u64,
    pub estimated_fee_sat: u64,
}

/// Greedy largest-first coin selection against a target amount plus a
/// running fee estimate for the chosen input family, fee rate, and output
/// count (destination, and destination + change).
///
/// Sorts candidates by amount descending and accumulates until the running
/// total covers `target_sat` plus the fee estimated for the inputs consumed
/// so far. Recomputes the fee estimate on every iteration since it grows
/// with the input count.
pub fn select_coins(
    utxos: &[UtxoRecord],
    target_sat: u64,
    fee_rate_sat_per_vb: f64,
    input_family: ScriptFamily,
    has_change: bool,
) -> Result<SelectionResult, BtcError> {
    let mut sorted: Vec<&UtxoRecord> = utxos.iter().collect();
    sorted.sort_by(|a, b| b.amount_sat.cmp(&a.amount_sat));

    let output_count = if has_change { 2.0 } else { 1.0 };
    let input_vb = estimated_input_vbytes(input_family);

    let mut selected: Vec<UtxoRecord> = Vec::new();
    let mut total: u64 = 0;

    for utxo in sorted {
        selected.push(utxo.clone());
        total += utxo.amount_sat;

        let estimated_vsize = constants::TX_OVERHEAD_VBYTES
            + (selected.len() as f64) * input_vb
            + output_count * constants::OUTPUT_VBYTES;
        let estimated_fee = (estimated_vsize * fee_rate_sat_per_vb).ceil() as u64;

        if total >= target_sat + estimated_fee {
            return Ok(SelectionResult {
                selected,
                total_input_sat: total,
                estimated_fee_sat: estimated_fee,
            });
        }
    }

    let estimated_vsize = constants::TX_OVERHEAD_VBYTES
        + (selected.len() as f64) * input_vb
        + output_count * constants::OUTPUT_VBYTES;
    let estimated_fee = (estimated_vsize * fee_rate_sat_per_vb).ceil() as u64;
    Err(BtcError::InsufficientFunds {
        available: total,
        required: target_sat + estimated_fee,
    })
}

/// Returns `true` when `change_sat` is below the dust threshold and should
/// instead be folded into the fee. A change output exactly at the threshold
/// is kept.
pub fn is_dust(change_sat: u64) -> bool {
    change_sat < constants::DUST_LIMIT
}
