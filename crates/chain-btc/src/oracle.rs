//! A blocking Electrum/Fulcrum JSON-RPC client: the engine's only source of
//! chain state (UTXOs, prevout transactions, fee estimates) and its only
//! path to broadcast a finished transaction.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{ORACLE_MAX_RETRIES, ORACLE_RECV_BUFFER_SIZE, ORACLE_TIMEOUT_S};
use crate::error::BtcError;

/// A scripthash's balance as reported by `blockchain.scripthash.get_balance`.
/// `unconfirmed` carries the sign Electrum gives it: positive for incoming
/// mempool value, negative when confirmed coins have an unconfirmed spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub confirmed_sat: u64,
    pub unconfirmed_sat: i64,
}

/// The RPC calls the transaction engine ever issues.
pub trait ChainOracle {
    fn get_balance(&mut self, scripthash: &str) -> Result<Balance, BtcError>;
    fn list_unspent(&mut self, scripthash: &str) -> Result<Vec<Value>, BtcError>;
    fn get_transaction_hex(&mut self, txid: &str) -> Result<String, BtcError>;
    fn estimate_fee_sat_per_vb(&mut self, target_blocks: u32) -> Result<f64, BtcError>;
    fn broadcast(&mut self, raw_tx_hex: &str) -> Result<String, BtcError>;
}

enum Transport {
    Plain(TcpStream),
    Tls(native_tls::TlsStream<TcpStream>),
}

impl std::io::Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }
}

impl std::io::Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }
}

/// A blocking JSON-RPC-over-TCP/TLS client speaking the Electrum protocol
/// (newline-delimited JSON-RPC 2.0 requests/responses, one per line).
///
/// Owns no persistent connection: every call opens a fresh socket, sends its
/// one request, reads the one response line, and closes it.
pub struct JsonRpcOracle {
    host: String,
    port: u16,
    use_tls: bool,
    next_id: u64,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl JsonRpcOracle {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        JsonRpcOracle { host: host.into(), port, use_tls, next_id: 1 }
    }

    fn connect(&self) -> Result<Transport, BtcError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| BtcError::NetworkError(format!("connect to {}:{} failed: {e}", self.host, self.port)))?;
        stream
            .set_read_timeout(Some(Duration::from_secs(ORACLE_TIMEOUT_S)))
            .map_err(|e| BtcError::NetworkError(format!("set_read_timeout failed: {e}")))?;
        stream
            .set_write_timeout(Some(Duration::from_secs(ORACLE_TIMEOUT_S)))
            .map_err(|e| BtcError::NetworkError(format!("set_write_timeout failed: {e}")))?;

        if self.use_tls {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| BtcError::NetworkError(format!("TLS connector init failed: {e}")))?;
            let tls_stream = connector
                .connect(&self.host, stream)
                .map_err(|e| BtcError::NetworkError(format!("TLS handshake failed: {e}")))?;
            Ok(Transport::Tls(tls_stream))
        } else {
            Ok(Transport::Plain(stream))
        }
    }

    /// Opens a fresh connection, sends one request, reads the one response
    /// line, and lets the connection drop at the end of the call.
    fn call_once(&mut self, method: &str, params: Value) -> Result<Value, BtcError> {
        let transport = self.connect()?;
        let mut reader = BufReader::with_capacity(ORACLE_RECV_BUFFER_SIZE, transport);

        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest { jsonrpc: "2.0", id, method, params };
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| BtcError::OracleError(format!("request serialization failed: {e}")))?;
        line.push(b'\n');

        reader
            .get_mut()
            .write_all(&line)
            .map_err(|e| BtcError::NetworkError(format!("write failed: {e}")))?;

        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .map_err(|e| BtcError::NetworkError(format!("read failed: {e}")))?;

        let response: JsonRpcResponse = serde_json::from_str(response_line.trim())
            .map_err(|e| BtcError::OracleError(format!("malformed response: {e}")))?;

        if let Some(error) = response.error {
            return Err(BtcError::OracleError(format!("server returned an error: {error}")));
        }
        response
            .result
            .ok_or_else(|| BtcError::OracleError("response carried neither result nor error".into()))
    }

    /// Calls `method`, retrying up to [`ORACLE_MAX_RETRIES`] times (inclusive
    /// of the first attempt) on transport-level failures. Each attempt opens
    /// its own connection, so a retry never reuses a socket a prior attempt
    /// failed on.
    fn call_with_retry(&mut self, method: &str, params: Value) -> Result<Value, BtcError> {
        let mut last_error = None;
        for attempt in 1..=ORACLE_MAX_RETRIES {
            match self.call_once(method, params.clone()) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(method, attempt, error = %err, "chain oracle call failed, retrying");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| BtcError::OracleError("exhausted retries".into())))
    }
}

impl ChainOracle for JsonRpcOracle {
    fn get_balance(&mut self, scripthash: &str) -> Result<Balance, BtcError> {
        let result = self.call_with_retry(
            "blockchain.scripthash.get_balance",
            serde_json::json!([scripthash]),
        )?;
        let confirmed_sat = result
            .get("confirmed")
            .and_then(Value::as_u64)
            .ok_or_else(|| BtcError::OracleError("get_balance missing confirmed field".into()))?;
        let unconfirmed_sat = result
            .get("unconfirmed")
            .and_then(Value::as_i64)
            .ok_or_else(|| BtcError::OracleError("get_balance missing unconfirmed field".into()))?;
        Ok(Balance { confirmed_sat, unconfirmed_sat })
    }

    fn list_unspent(&mut self, scripthash: &str) -> Result<Vec<Value>, BtcError> {
        let result = self.call_with_retry(
            "blockchain.scripthash.listunspent",
            serde_json::json!([scripthash]),
        )?;
        result
            .as_array()
            .cloned()
            .ok_or_else(|| BtcError::OracleError("listunspent did not return an array".into()))
    }

    fn get_transaction_hex(&mut self, txid: &str) -> Result<String, BtcError> {
        let result = self.call_with_retry("blockchain.transaction.get", serde_json::json!([txid]))?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| BtcError::OracleError("transaction.get did not return a string".into()))
    }

    fn estimate_fee_sat_per_vb(&mut self, target_blocks: u32) -> Result<f64, BtcError> {
        let result = self.call_with_retry("blockchain.estimatefee", serde_json::json!([target_blocks]))?;
        let btc_per_kvb = result
            .as_f64()
            .ok_or_else(|| BtcError::OracleError("estimatefee did not return a number".into()))?;
        if btc_per_kvb <= 0.0 {
            return Ok(crate::constants::DEFAULT_FEE_RATE);
        }
        Ok(btc_per_kvb * (crate::constants::SAT_PER_BTC as f64) / 1000.0)
    }

    fn broadcast(&mut self, raw_tx_hex: &str) -> Result<String, BtcError> {
        let result = self.call_with_retry(
            "blockchain.transaction.broadcast",
            serde_json::json!([raw_tx_hex]),
        )?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| BtcError::OracleError("broadcast did not return a txid".into()))
    }
}
