//! Scripted in-memory [`LedgerClient`] for unit tests.
//!
//! Every response is set up front with a `with_*` builder; every call is
//! counted by its JSON-RPC method name so tests can assert what the
//! pipeline did and, just as often, what it did not do.

use std::collections::{HashMap, VecDeque};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::network::client::{BlockHeader, CallRequest, LedgerClient, LogFilter, RpcClientError};
use crate::network::rpc::{RpcError, RpcMethod};
use crate::transaction::receipt::{LogEntry, TransactionReceipt};

type Scripted<T> = Result<T, RpcClientError>;

pub struct MockLedger {
    chain_id: u64,
    head: BlockHeader,
    gas_price: U256,
    balance: U256,
    code: Bytes,
    calls_by_selector: HashMap<[u8; 4], Scripted<Bytes>>,
    estimate: Scripted<u64>,
    nonce: u64,
    send: Scripted<B256>,
    receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    logs: Scripted<Vec<LogEntry>>,
    counters: Mutex<HashMap<&'static str, usize>>,
    sent: Mutex<Vec<Bytes>>,
    filters: Mutex<Vec<LogFilter>>,
}

impl MockLedger {
    /// A ledger on chain 1337 with a 1 gwei base fee, a funded account,
    /// deployed code, and nothing scripted for calls or receipts.
    pub fn new() -> Self {
        Self {
            chain_id: 1337,
            head: BlockHeader {
                number: 100,
                base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
                timestamp: 1_700_000_000,
            },
            gas_price: U256::from(1_000_000_000u64),
            balance: U256::from(10u64).pow(U256::from(18u64)),
            code: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]),
            calls_by_selector: HashMap::new(),
            estimate: Ok(100_000),
            nonce: 0,
            send: Ok(B256::repeat_byte(0xab)),
            receipts: Mutex::new(VecDeque::new()),
            logs: Ok(Vec::new()),
            counters: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn with_head(mut self, head: BlockHeader) -> Self {
        self.head = head;
        self
    }

    pub fn with_gas_price(mut self, price: U256) -> Self {
        self.gas_price = price;
        self
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_code(mut self, code: Bytes) -> Self {
        self.code = code;
        self
    }

    /// Scripts the `eth_call` answer for calls whose data starts with
    /// `selector`.
    pub fn with_call(mut self, selector: [u8; 4], response: Scripted<Bytes>) -> Self {
        self.calls_by_selector.insert(selector, response);
        self
    }

    pub fn with_estimate(mut self, estimate: Scripted<u64>) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_send(mut self, send: Scripted<B256>) -> Self {
        self.send = send;
        self
    }

    /// Queues receipt poll answers in order. Once the queue is drained
    /// every further poll sees a pending transaction.
    pub fn with_receipts(self, receipts: Vec<Option<TransactionReceipt>>) -> Self {
        self.receipts.lock().extend(receipts);
        self
    }

    pub fn with_logs(mut self, logs: Scripted<Vec<LogEntry>>) -> Self {
        self.logs = logs;
        self
    }

    /// How many times `method` (wire name) was called.
    pub fn calls(&self, method: &str) -> usize {
        self.counters.lock().get(method).copied().unwrap_or(0)
    }

    /// Raw transactions passed to `eth_sendRawTransaction`.
    pub fn sent_transactions(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    /// Filters passed to `eth_getLogs`.
    pub fn log_filters(&self) -> Vec<LogFilter> {
        self.filters.lock().clone()
    }

    fn record(&self, method: RpcMethod) {
        *self.counters.lock().entry(method.as_str()).or_insert(0) += 1;
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> Result<u64, RpcClientError> {
        self.record(RpcMethod::ChainId);
        Ok(self.chain_id)
    }

    async fn latest_block(&self) -> Result<BlockHeader, RpcClientError> {
        self.record(RpcMethod::GetBlockByNumber);
        Ok(self.head.clone())
    }

    async fn gas_price(&self) -> Result<U256, RpcClientError> {
        self.record(RpcMethod::GasPrice);
        Ok(self.gas_price)
    }

    async fn balance(&self, _address: Address) -> Result<U256, RpcClientError> {
        self.record(RpcMethod::GetBalance);
        Ok(self.balance)
    }

    async fn code_at(&self, _address: Address) -> Result<Bytes, RpcClientError> {
        self.record(RpcMethod::GetCode);
        Ok(self.code.clone())
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, RpcClientError> {
        self.record(RpcMethod::Call);
        let selector: Option<[u8; 4]> = request
            .data
            .get(..4)
            .and_then(|s| s.try_into().ok());
        match selector.and_then(|s| self.calls_by_selector.get(&s)) {
            Some(response) => response.clone(),
            None => Err(RpcClientError::Rpc {
                method: RpcMethod::Call,
                error: RpcError::execution_reverted(),
            }),
        }
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, RpcClientError> {
        self.record(RpcMethod::EstimateGas);
        self.estimate.clone()
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, RpcClientError> {
        self.record(RpcMethod::GetTransactionCount);
        Ok(self.nonce)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcClientError> {
        self.record(RpcMethod::SendRawTransaction);
        self.sent.lock().push(Bytes::copy_from_slice(raw));
        self.send.clone()
    }

    async fn transaction_receipt(
        &self,
        _hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcClientError> {
        self.record(RpcMethod::GetTransactionReceipt);
        Ok(self.receipts.lock().pop_front().flatten())
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcClientError> {
        self.record(RpcMethod::GetLogs);
        self.filters.lock().push(filter.clone());
        self.logs.clone()
    }
}
