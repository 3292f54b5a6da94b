//! Transaction types and consensus serialization, stripped and witness form.

use crypto_utils::varint;

use crate::error::BtcError;

/// A transaction input. `script_sig` is empty for witness inputs (P2WPKH,
/// P2TR); `witness` is empty for legacy inputs (P2PK, P2PKH, P2SH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub txid: [u8; 32],
    pub vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        TxIn {
            txid,
            vout,
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
            witness: Vec::new(),
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value_sat: u64,
    pub script_pubkey: Vec<u8>,
}

/// An assembled transaction, signed or unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub locktime: u32,
}

fn has_witness_data(tx: &Transaction) -> bool {
    tx.inputs.iter().any(|i| !i.witness.is_empty())
}

fn serialize_outpoint(out: &mut Vec<u8>, input: &TxIn) {
    let mut txid_le = input.txid;
    txid_le.reverse();
    out.extend_from_slice(&txid_le);
    out.extend_from_slice(&input.vout.to_le_bytes());
}

fn serialize_script(out: &mut Vec<u8>, script: &[u8]) {
    out.extend(varint::encode(script.len() as u64));
    out.extend_from_slice(script);
}

/// Serializes the transaction in the legacy (pre-SegWit) form: this is what
/// every sighash algorithm signs over, regardless of whether the final
/// broadcast form carries witness data.
pub fn serialize_stripped(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    out.extend(varint::encode(tx.inputs.len() as u64));
    for input in &tx.inputs {
        serialize_outpoint(&mut out, input);
        serialize_script(&mut out, &input.script_sig);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }
    out.extend(varint::encode(tx.outputs.len() as u64));
    for output in &tx.outputs {
        out.extend_from_slice(&output.value_sat.to_le_bytes());
        serialize_script(&mut out, &output.script_pubkey);
    }
    out.extend_from_slice(&tx.locktime.to_le_bytes());
    out
}

/// Serializes the transaction in its final broadcast form: if any input
/// carries witness data, the SegWit marker/flag (`0x00 0x01`) and per-input
/// witness stacks are included.
pub fn serialize_witness(tx: &Transaction) -> Vec<u8> {
    if !has_witness_data(tx) {
        return serialize_stripped(tx);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    out.push(0x00); // marker
    out.push(0x01); // flag
    out.extend(varint::encode(tx.inputs.len() as u64));
    for input in &tx.inputs {
        serialize_outpoint(&mut out, input);
        serialize_script(&mut out, &input.script_sig);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }
    out.extend(varint::encode(tx.outputs.len() as u64));
    for output in &tx.outputs {
        out.extend_from_slice(&output.value_sat.to_le_bytes());
        serialize_script(&mut out, &output.script_pubkey);
    }
    for input in &tx.inputs {
        out.extend(varint::encode(input.witness.len() as u64));
        for item in &input.witness {
            serialize_script(&mut out, item);
        }
    }
    out.extend_from_slice(&tx.locktime.to_le_bytes());
    out
}

fn truncated() -> BtcError {
    BtcError::InvalidScript("transaction bytes truncated".into())
}

fn read_bytes<'a>(buf: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8], BtcError> {
    buf.get(offset..offset + len).ok_or_else(truncated)
}

fn read_script(buf: &[u8], offset: usize) -> Result<(Vec<u8>, usize), BtcError> {
    let (len, offset) = varint::read(buf, offset).map_err(|_| truncated())?;
    let bytes = read_bytes(buf, offset, len as usize)?;
    Ok((bytes.to_vec(), offset + len as usize))
}

/// Parses a transaction from its consensus-serialized bytes, recognising
/// both the stripped and witness forms (the marker/flag pair `0x00 0x01`
/// right after the version field signals the latter).
pub fn parse(bytes: &[u8]) -> Result<Transaction, BtcError> {
    if bytes.len() < 4 {
        return Err(truncated());
    }
    let version = i32::from_le_bytes(read_bytes(bytes, 0, 4)?.try_into().unwrap());
    let mut offset = 4;

    let has_witness = bytes.get(4) == Some(&0x00) && bytes.get(5) == Some(&0x01);
    if has_witness {
        offset = 6;
    }

    let (input_count, mut offset) = varint::read(bytes, offset).map_err(|_| truncated())?;
    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let mut txid_le: [u8; 32] = read_bytes(bytes, offset, 32)?.try_into().unwrap();
        txid_le.reverse();
        offset += 32;
        let vout = u32::from_le_bytes(read_bytes(bytes, offset, 4)?.try_into().unwrap());
        offset += 4;
        let (script_sig, next) = read_script(bytes, offset)?;
        offset = next;
        let sequence = u32::from_le_bytes(read_bytes(bytes, offset, 4)?.try_into().unwrap());
        offset += 4;
        inputs.push(TxIn { txid: txid_le, vout, script_sig, sequence, witness: Vec::new() });
    }

    let (output_count, mut offset) = varint::read(bytes, offset).map_err(|_| truncated())?;
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let value_sat = u64::from_le_bytes(read_bytes(bytes, offset, 8)?.try_into().unwrap());
        offset += 8;
        let (script_pubkey, next) = read_script(bytes, offset)?;
        offset = next;
        outputs.push(TxOut { value_sat, script_pubkey });
    }

    if has_witness {
        for input in &mut inputs {
            let (item_count, next) = varint::read(bytes, offset).map_err(|_| truncated())?;
            offset = next;
            let mut witness = Vec::with_capacity(item_count as usize);
            for _ in 0..item_count {
                let (item, next) = read_script(bytes, offset)?;
                offset = next;
                witness.push(item);
            }
            input.witness = witness;
        }
    }

    let locktime = u32::from_le_bytes(read_bytes(bytes, offset, 4)?.try_into().unwrap());

    Ok(Transaction { version, inputs, outputs, locktime })
}

/// Transaction weight in weight units: `stripped*3 + witness`, per BIP-141.
pub fn weight(tx: &Transaction) -> u64 {
    let stripped_len = serialize_stripped(tx).len() as u64;
    let witness_len = serialize_witness(tx).len() as u64;
    stripped_len * 3 + witness_len
}

/// Virtual size in vbytes, rounded up, per BIP-141: `ceil(weight / 4)`.
pub fn vsize(tx: &Transaction) -> u64 {
    weight(tx).div_ceil(4)
}
