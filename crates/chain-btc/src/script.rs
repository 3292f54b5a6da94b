//! scriptPubKey construction and classification for the five supported
//! output families.

use crate::constants::OP_RETURN_MAX_BYTES;
use crate::error::BtcError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_RETURN: u8 = 0x6a;

/// Returns `OP_1 + (n - 1)` for `n` in `1..=16`.
pub fn op_n(n: u8) -> u8 {
    0x50 + n
}

/// The five output script families this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFamily {
    P2pk,
    P2pkh,
    P2sh,
    P2wpkh,
    P2tr,
}

impl ScriptFamily {
    pub fn is_witness(self) -> bool {
        matches!(self, ScriptFamily::P2wpkh | ScriptFamily::P2tr)
    }
}

/// Minimal length-prefixed push (direct push for ≤75 bytes, `OP_PUSHDATA1`
/// for 76..=255 bytes). The engine never pushes data longer than that.
pub fn push_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    if data.len() < 0x4c {
        out.push(data.len() as u8);
    } else {
        out.push(OP_PUSHDATA1);
        out.push(data.len() as u8);
    }
    out.extend_from_slice(data);
    out
}

pub fn spk_p2pkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut out = Vec::with_capacity(25);
    out.push(OP_DUP);
    out.push(OP_HASH160);
    out.extend_from_slice(&push_data(pubkey_hash));
    out.push(OP_EQUALVERIFY);
    out.push(OP_CHECKSIG);
    out
}

pub fn spk_p2sh(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut out = Vec::with_capacity(23);
    out.push(OP_HASH160);
    out.extend_from_slice(&push_data(script_hash));
    out.push(OP_EQUAL);
    out
}

pub fn spk_p2wpkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut out = Vec::with_capacity(22);
    out.push(OP_0);
    out.extend_from_slice(&push_data(pubkey_hash));
    out
}

pub fn spk_p2tr(output_key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(34);
    out.push(op_n(1));
    out.extend_from_slice(&push_data(output_key));
    out
}

pub fn spk_p2pk(pubkey: &[u8]) -> Result<Vec<u8>, BtcError> {
    if pubkey.len() != 33 && pubkey.len() != 65 {
        return Err(BtcError::InvalidScript(format!(
            "P2PK pubkey must be 33 or 65 bytes, got {}",
            pubkey.len()
        )));
    }
    let mut out = push_data(pubkey);
    out.push(OP_CHECKSIG);
    Ok(out)
}

/// Builds an OP_RETURN output script, truncating the message to
/// [`OP_RETURN_MAX_BYTES`] bytes first.
pub fn spk_op_return(message: &[u8]) -> Vec<u8> {
    let truncated = &message[..message.len().min(OP_RETURN_MAX_BYTES)];
    let mut out = Vec::with_capacity(2 + truncated.len());
    out.push(OP_RETURN);
    out.extend_from_slice(&push_data(truncated));
    out
}

/// Builds a bare-multisig redeem script: `OP_m <pk1> .. <pkn> OP_n OP_CHECKMULTISIG`.
/// Callers are expected to have already sorted `pubkeys` per BIP-67 if that
/// ordering is desired; this function does not sort.
pub fn build_redeem_script_multisig(m: u8, pubkeys: &[Vec<u8>]) -> Result<Vec<u8>, BtcError> {
    let n = pubkeys.len();
    if m == 0 || (m as usize) > n || n > 16 {
        return Err(BtcError::InvalidScript(format!(
            "multisig requires 1 <= m <= n <= 16, got m={m} n={n}"
        )));
    }
    let mut out = vec![op_n(m)];
    for pubkey in pubkeys {
        out.extend(push_data(pubkey));
    }
    out.push(op_n(n as u8));
    out.push(OP_CHECKMULTISIG);
    Ok(out)
}

/// Parses a bare-multisig redeem script back into `(m, n, pubkeys)`.
pub fn parse_redeem_script_multisig(redeem_script: &[u8]) -> Result<(u8, u8, Vec<Vec<u8>>), BtcError> {
    let invalid = || BtcError::InvalidScript("redeem script is not a recognised multisig pattern".into());

    if redeem_script.len() < 3 {
        return Err(invalid());
    }
    let m_op = redeem_script[0];
    if !(0x51..=0x60).contains(&m_op) {
        return Err(invalid());
    }
    let m = m_op - 0x50;

    let mut pubkeys = Vec::new();
    let mut i = 1usize;
    while i < redeem_script.len() {
        let len = redeem_script[i] as usize;
        if (len == 33 || len == 65) && i + 1 + len < redeem_script.len() {
            pubkeys.push(redeem_script[i + 1..i + 1 + len].to_vec());
            i += 1 + len;
        } else {
            break;
        }
    }

    if i + 1 >= redeem_script.len() {
        return Err(invalid());
    }
    let n_op = redeem_script[i];
    if !(0x51..=0x60).contains(&n_op) {
        return Err(invalid());
    }
    let n = n_op - 0x50;
    if redeem_script[i + 1] != OP_CHECKMULTISIG || i + 2 != redeem_script.len() {
        return Err(invalid());
    }
    if n as usize != pubkeys.len() {
        return Err(invalid());
    }

    Ok((m, n, pubkeys))
}

/// Classifies a scriptPubKey into its output family.
pub fn family_from_spk(spk: &[u8]) -> Result<ScriptFamily, BtcError> {
    if spk.len() == 25 && spk[0] == OP_DUP && spk[1] == OP_HASH160 && spk[2] == 20 && spk[23] == OP_EQUALVERIFY && spk[24] == OP_CHECKSIG {
        return Ok(ScriptFamily::P2pkh);
    }
    if spk.len() == 23 && spk[0] == OP_HASH160 && spk[1] == 20 && spk[22] == OP_EQUAL {
        return Ok(ScriptFamily::P2sh);
    }
    if spk.len() == 22 && spk[0] == OP_0 && spk[1] == 20 {
        return Ok(ScriptFamily::P2wpkh);
    }
    if spk.len() == 34 && spk[0] == op_n(1) && spk[1] == 32 {
        return Ok(ScriptFamily::P2tr);
    }
    if spk.len() >= 2 {
        let push_len = spk[0] as usize;
        if (push_len == 33 || push_len == 65)
            && spk.len() == push_len + 2
            && spk[spk.len() - 1] == OP_CHECKSIG
        {
            return Ok(ScriptFamily::P2pk);
        }
    }
    Err(BtcError::InvalidScript("scriptPubKey matches no known family".into()))
}
