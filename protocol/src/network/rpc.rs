//! # JSON-RPC Wire Types
//!
//! Type-safe envelopes for the Ethereum JSON-RPC methods the pipeline
//! consumes. The transport lives in [`super::http`]; this module only knows
//! what goes on the wire.
//!
//! ## Method Index
//!
//! | Method                      | Used by                                  |
//! |-----------------------------|------------------------------------------|
//! | `eth_chainId`               | replay protection on signed envelopes    |
//! | `eth_getBlockByNumber`      | fee strategy selection (chain head)      |
//! | `eth_gasPrice`              | legacy fee quote                         |
//! | `eth_getBalance`            | balance guard, diagnostics               |
//! | `eth_getCode`               | contract presence check                  |
//! | `eth_call`                  | authorization gate, verification reader  |
//! | `eth_estimateGas`           | transaction submitter                    |
//! | `eth_getTransactionCount`   | pending nonce                            |
//! | `eth_sendRawTransaction`    | broadcast                                |
//! | `eth_getTransactionReceipt` | confirmation wait                        |
//! | `eth_getLogs`               | historical identifier query              |

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

/// Supported JSON-RPC methods. The wire name is the serde rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "eth_chainId")]
    ChainId,
    /// Parameters: `(block_tag, full_transactions: bool)`
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber,
    #[serde(rename = "eth_gasPrice")]
    GasPrice,
    /// Parameters: `(address, block_tag)`
    #[serde(rename = "eth_getBalance")]
    GetBalance,
    /// Parameters: `(address, block_tag)`
    #[serde(rename = "eth_getCode")]
    GetCode,
    /// Parameters: `(call_request, block_tag)`
    #[serde(rename = "eth_call")]
    Call,
    /// Parameters: `(call_request)`
    #[serde(rename = "eth_estimateGas")]
    EstimateGas,
    /// Parameters: `(address, block_tag)`
    #[serde(rename = "eth_getTransactionCount")]
    GetTransactionCount,
    /// Parameters: `(raw_signed_tx_hex)`
    #[serde(rename = "eth_sendRawTransaction")]
    SendRawTransaction,
    /// Parameters: `(tx_hash)`
    #[serde(rename = "eth_getTransactionReceipt")]
    GetTransactionReceipt,
    /// Parameters: `(filter)`
    #[serde(rename = "eth_getLogs")]
    GetLogs,
}

impl RpcMethod {
    /// The method name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::ChainId => "eth_chainId",
            RpcMethod::GetBlockByNumber => "eth_getBlockByNumber",
            RpcMethod::GasPrice => "eth_gasPrice",
            RpcMethod::GetBalance => "eth_getBalance",
            RpcMethod::GetCode => "eth_getCode",
            RpcMethod::Call => "eth_call",
            RpcMethod::EstimateGas => "eth_estimateGas",
            RpcMethod::GetTransactionCount => "eth_getTransactionCount",
            RpcMethod::SendRawTransaction => "eth_sendRawTransaction",
            RpcMethod::GetTransactionReceipt => "eth_getTransactionReceipt",
            RpcMethod::GetLogs => "eth_getLogs",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// Request identifier. Echoed back in the response.
    pub id: u64,
    /// The method to invoke.
    pub method: RpcMethod,
    /// Positional parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// A conforming node sets exactly one of `result` or `error`. Note that a
/// `null` result is legitimate (an unmined receipt), so `result: None` with
/// `error: None` is read as JSON `null`, not as a protocol violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// The request ID this response corresponds to.
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Errors
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 error object as returned by the ledger node.
///
/// Besides the standard `-327xx`/`-326xx` codes, Ethereum nodes use:
/// - `3`: execution reverted (geth, with ABI-encoded reason in `data`)
/// - `-32000`: generic server error, which covers "insufficient funds",
///   "nonce too low" and, on older nodes, reverts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Geth's dedicated code for reverted `eth_call`/`eth_estimateGas`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid method parameters.
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Execution reverted, as geth reports it.
    pub fn execution_reverted() -> Self {
        Self::new(EXECUTION_REVERTED_CODE, "execution reverted")
    }

    /// Generic server-side rejection (`-32000`).
    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::new(-32000, msg)
    }

    /// Whether the node is reporting an EVM revert. Ganache and older
    /// clients only say so in the message ("VM Exception ... revert").
    pub fn is_revert(&self) -> bool {
        self.code == EXECUTION_REVERTED_CODE || self.message.to_lowercase().contains("revert")
    }

    /// Whether the node refused a transaction for lack of funds.
    pub fn is_insufficient_funds(&self) -> bool {
        self.message.to_lowercase().contains("insufficient funds")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
