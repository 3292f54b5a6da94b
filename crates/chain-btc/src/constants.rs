//! Named constants for the transaction engine, centralized in one place
//! rather than scattered as literals through the call sites.

/// Satoshis per bitcoin.
pub const SAT_PER_BTC: u64 = 100_000_000;

/// Outputs below this value (in satoshi) are not relayed; the selector folds
/// a would-be change output below this threshold into the fee instead.
pub const DUST_LIMIT: u64 = 546;

/// Default fee rate in sat/vB when the caller does not specify one.
pub const DEFAULT_FEE_RATE: f64 = 1.0;

/// SIGHASH_ALL, the only sighash type this engine emits for legacy/SegWit-v0.
pub const SIGHASH_ALL: u8 = 0x01;

/// Taproot's DEFAULT sighash type (BIP-341); an explicit 0 byte is never
/// appended to the signature for this type.
pub const SIGHASH_DEFAULT: u8 = 0x00;

/// Maximum payload length for an OP_RETURN output, in bytes.
pub const OP_RETURN_MAX_BYTES: usize = 80;

/// Per-input virtual-size estimates used to seed the coin selector, before
/// the assembler's fee-convergence loop has an actual built transaction to
/// measure. Carried over from the original engine's `config.py`; the
/// distilled spec only names the P2PKH figure explicitly.
pub mod input_vbytes {
    pub const P2PK: f64 = 114.0;
    pub const P2PKH: f64 = 148.0;
    pub const P2SH_MULTISIG: f64 = 520.0;
    pub const P2WPKH: f64 = 68.0;
    pub const P2TR: f64 = 57.25;
}

/// Estimated vbytes contributed by a single output, used by the selector's
/// running fee estimate (`2 * OUTPUT_VBYTES` for destination + change).
pub const OUTPUT_VBYTES: f64 = 34.0;

/// Fixed transaction overhead (version + locktime + varint counts) assumed
/// by the selector's running fee estimate.
pub const TX_OVERHEAD_VBYTES: f64 = 10.0;

/// Initial fee guess (satoshi) the fee-convergence loop starts from.
pub const INITIAL_FEE_SAT: u64 = 200;

/// Upper bound on fee-convergence loop iterations before giving up.
pub const MAX_FEE_ITERATIONS: u32 = 10;

/// Default Electrum/Fulcrum TCP port (plaintext JSON-RPC).
pub const ORACLE_PORT_PLAIN: u16 = 50001;

/// Default Electrum/Fulcrum TLS port.
pub const ORACLE_PORT_TLS: u16 = 50002;

/// Default blocking-connect / request timeout for the chain oracle, seconds.
pub const ORACLE_TIMEOUT_S: u64 = 10;

/// Maximum number of attempts (including the first) the oracle client makes
/// per logical request before surfacing the failure to the caller.
pub const ORACLE_MAX_RETRIES: u32 = 3;

/// Size of the read buffer used when draining an oracle response.
pub const ORACLE_RECV_BUFFER_SIZE: usize = 65536;
