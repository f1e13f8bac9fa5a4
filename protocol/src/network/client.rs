//! The ledger client seam.
//!
//! [`LedgerClient`] is the only way the pipeline talks to the chain. The
//! production binding is [`super::http::HttpLedgerClient`]; tests and the
//! local devnet plug in in-memory implementations. Each method maps to
//! exactly one JSON-RPC call, so a failure always names the method that
//! caused it.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::quantity;
use crate::network::rpc::{RpcError, RpcMethod};
use crate::transaction::receipt::{LogEntry, TransactionReceipt};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures of a single JSON-RPC round trip.
#[derive(Debug, Clone, Error)]
pub enum RpcClientError {
    #[error("{method}: transport error: {reason}")]
    Transport { method: RpcMethod, reason: String },

    #[error("{method}: request timed out after {elapsed_ms}ms")]
    Timeout { method: RpcMethod, elapsed_ms: u64 },

    #[error("{method}: HTTP {status}: {body}")]
    Http {
        method: RpcMethod,
        status: u16,
        body: String,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("{method}: {error}")]
    Rpc { method: RpcMethod, error: RpcError },

    #[error("{method}: malformed response: {reason}")]
    Decode { method: RpcMethod, reason: String },
}

impl RpcClientError {
    pub fn method(&self) -> RpcMethod {
        match self {
            RpcClientError::Transport { method, .. }
            | RpcClientError::Timeout { method, .. }
            | RpcClientError::Http { method, .. }
            | RpcClientError::Rpc { method, .. }
            | RpcClientError::Decode { method, .. } => *method,
        }
    }

    /// The node reported an EVM revert.
    pub fn is_revert(&self) -> bool {
        matches!(self, RpcClientError::Rpc { error, .. } if error.is_revert())
    }

    /// The node refused a transaction for lack of funds.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, RpcClientError::Rpc { error, .. } if error.is_insufficient_funds())
    }
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// The subset of a block header the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    #[serde(with = "quantity")]
    pub number: u64,
    /// Present only on chains running the dynamic fee market.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<U256>,
    #[serde(with = "quantity")]
    pub timestamp: u64,
}

/// Parameters of `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            data: data.into(),
        }
    }

    pub fn with_sender(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// An `eth_getLogs` filter over an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub address: Address,
    /// Positional topic filter; only `topics[0]` is used in practice.
    pub topics: Vec<B256>,
    #[serde(with = "quantity")]
    pub from_block: u64,
    #[serde(with = "quantity")]
    pub to_block: u64,
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// Read and write access to an EVM ledger.
///
/// Implementations must be shareable across tasks; the pipeline holds one
/// behind an `Arc` and never mutates it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> Result<u64, RpcClientError>;

    /// `eth_getBlockByNumber("latest", false)`
    async fn latest_block(&self) -> Result<BlockHeader, RpcClientError>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> Result<U256, RpcClientError>;

    /// `eth_getBalance(address, "latest")`
    async fn balance(&self, address: Address) -> Result<U256, RpcClientError>;

    /// `eth_getCode(address, "latest")`
    async fn code_at(&self, address: Address) -> Result<Bytes, RpcClientError>;

    /// `eth_call(request, "latest")`
    async fn call(&self, request: &CallRequest) -> Result<Bytes, RpcClientError>;

    /// `eth_estimateGas(request)`
    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcClientError>;

    /// `eth_getTransactionCount(address, "pending")`
    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcClientError>;

    /// `eth_sendRawTransaction(raw)`; returns the transaction hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcClientError>;

    /// `eth_getTransactionReceipt(hash)`; `None` while the transaction is
    /// still pending.
    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcClientError>;

    /// `eth_getLogs(filter)`
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcClientError>;
}
