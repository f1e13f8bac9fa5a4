//! JSON-RPC over HTTP.
//!
//! [`HttpLedgerClient`] is the production [`LedgerClient`]: one `POST` per
//! call against the configured endpoint, a per-request timeout, and a
//! monotonically increasing request id. Nothing is retried here; the
//! pipeline decides what a failure means.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{hex, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::LedgerConfig;
use crate::network::client::{BlockHeader, CallRequest, LedgerClient, LogFilter, RpcClientError};
use crate::network::quantity::Quantity;
use crate::network::rpc::{RpcMethod, RpcRequest, RpcResponse};
use crate::transaction::receipt::{LogEntry, TransactionReceipt};

/// Reqwest-backed ledger client.
#[derive(Debug)]
pub struct HttpLedgerClient {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    /// Builds a client for `endpoint` with the given per-request timeout.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, RpcClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcClientError::Transport {
                method: RpcMethod::ChainId,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Client for the endpoint and timeout in `config`.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, RpcClientError> {
        Self::new(config.ledger_url.clone(), config.rpc_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Sends one JSON-RPC request and decodes its `result`.
    ///
    /// A `null` result is passed to the decoder as JSON `null`, so callers
    /// asking for an `Option<T>` get `None` rather than an error.
    async fn request<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: Value,
    ) -> Result<T, RpcClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest::new(id, method, params);
        debug!(%method, id, "json-rpc request");

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcClientError::Timeout {
                        method,
                        elapsed_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    RpcClientError::Transport {
                        method,
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcClientError::Http {
                method,
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = resp.json().await.map_err(|e| RpcClientError::Decode {
            method,
            reason: format!("invalid JSON-RPC envelope: {e}"),
        })?;

        if let Some(error) = envelope.error {
            return Err(RpcClientError::Rpc { method, error });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null)).map_err(|e| {
            RpcClientError::Decode {
                method,
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn chain_id(&self) -> Result<u64, RpcClientError> {
        let Quantity(id) = self.request(RpcMethod::ChainId, json!([])).await?;
        Ok(id)
    }

    async fn latest_block(&self) -> Result<BlockHeader, RpcClientError> {
        let head: Option<BlockHeader> = self
            .request(RpcMethod::GetBlockByNumber, json!(["latest", false]))
            .await?;
        head.ok_or_else(|| RpcClientError::Decode {
            method: RpcMethod::GetBlockByNumber,
            reason: "node returned no latest block".into(),
        })
    }

    async fn gas_price(&self) -> Result<U256, RpcClientError> {
        self.request(RpcMethod::GasPrice, json!([])).await
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcClientError> {
        self.request(RpcMethod::GetBalance, json!([address, "latest"]))
            .await
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, RpcClientError> {
        self.request(RpcMethod::GetCode, json!([address, "latest"]))
            .await
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, RpcClientError> {
        self.request(RpcMethod::Call, json!([request, "latest"]))
            .await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcClientError> {
        let Quantity(gas) = self.request(RpcMethod::EstimateGas, json!([request])).await?;
        Ok(gas)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcClientError> {
        let Quantity(nonce) = self
            .request(RpcMethod::GetTransactionCount, json!([address, "pending"]))
            .await?;
        Ok(nonce)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcClientError> {
        self.request(
            RpcMethod::SendRawTransaction,
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcClientError> {
        self.request(RpcMethod::GetTransactionReceipt, json!([hash]))
            .await
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcClientError> {
        self.request(RpcMethod::GetLogs, json!([filter])).await
    }
}
