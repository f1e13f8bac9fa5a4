//! # Development Ledger
//!
//! [`DevLedger`] is a single-node, instantly-mining EVM ledger with exactly
//! one contract on it: a [`CredentialRegistry`]. It implements
//! [`LedgerClient`], so the pipeline runs against it unmodified. Every
//! transaction it receives is decoded and its signature recovered; the
//! sender is whoever signed, not whoever claims to have.
//!
//! ## What It Models
//!
//! - Nonces, balances, and gas charged at the effective price.
//! - Dynamic-fee chains (fixed base fee) and legacy chains (no base fee,
//!   typed envelopes rejected).
//! - Upfront `gas_limit * price` funding checks with geth's error wording.
//! - Reverts: the receipt reports failure and the registry is unchanged.
//!
//! ## What It Varies on Request
//!
//! Real clients disagree on receipt details. [`DevLedgerOptions`] picks the
//! status encoding, whether receipts carry raw logs, pre-decoded events or
//! nothing, how many polls a receipt stays pending, and whether
//! `eth_getLogs` results name their transaction.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info};

use credchain_protocol::config::{CREDENTIAL_ID_FIELD, CREDENTIAL_ISSUED_EVENT, GWEI};
use credchain_protocol::contract::abi::CredentialIssued;
use credchain_protocol::network::rpc::EXECUTION_REVERTED_CODE;
use credchain_protocol::network::{
    BlockHeader, CallRequest, LedgerClient, LogFilter, RpcClientError, RpcError, RpcMethod,
};
use credchain_protocol::transaction::{
    decode_signed_transaction, DecodedEvent, FeeFields, LogEntry, StatusValue,
    TransactionReceipt,
};

use crate::credential_registry::{CredentialRegistry, Execution, RegistryError};

/// Where the registry lives: the first contract deployed by the usual
/// development mnemonic's first account.
pub const REGISTRY_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Placeholder runtime code reported by `eth_getCode`.
const REGISTRY_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52];

const TX_BASE_GAS: u64 = 21_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NONZERO_GAS: u64 = 16;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How `status` is written into receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEncoding {
    /// `"0x1"` / `"0x0"`, as JSON-RPC nodes send it.
    HexString,
    /// `"1"` / `"0"`.
    Decimal,
    Bool,
    Number,
    /// Arbitrary-precision integer.
    Big,
    /// No status at all, as on pre-Byzantium chains.
    Absent,
}

/// What a receipt carries besides its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptShape {
    /// Raw logs only.
    RawLogs,
    /// Raw logs plus an `events` map decoded by name.
    DecodedEvents,
    /// Neither; events are only reachable through `eth_getLogs`.
    NoLogs,
}

#[derive(Debug, Clone)]
pub struct DevLedgerOptions {
    pub chain_id: u64,
    /// `Some` for a dynamic-fee chain. The base fee never moves.
    pub base_fee: Option<U256>,
    /// `eth_gasPrice` answer on legacy chains.
    pub gas_price: U256,
    pub genesis_timestamp: u64,
    pub block_time_secs: u64,
    pub status_encoding: StatusEncoding,
    pub receipt_shape: ReceiptShape,
    /// Receipt polls that return `null` before the receipt appears.
    pub pending_polls: u32,
    /// Whether `eth_getLogs` entries include `transactionHash`.
    pub logs_carry_tx_hash: bool,
}

impl Default for DevLedgerOptions {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            base_fee: Some(U256::from(GWEI)),
            gas_price: U256::from(2 * GWEI),
            genesis_timestamp: 1_700_000_000,
            block_time_secs: 12,
            status_encoding: StatusEncoding::HexString,
            receipt_shape: ReceiptShape::RawLogs,
            pending_polls: 0,
            logs_carry_tx_hash: true,
        }
    }
}

impl DevLedgerOptions {
    /// A chain without a base fee.
    pub fn legacy() -> Self {
        Self {
            base_fee: None,
            gas_price: U256::from(20 * GWEI),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// DevLedger
// ---------------------------------------------------------------------------

struct StoredReceipt {
    receipt: TransactionReceipt,
    polls_left: u32,
}

struct ChainState {
    registry: CredentialRegistry,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    head_number: u64,
    head_timestamp: u64,
    receipts: HashMap<B256, StoredReceipt>,
    logs: Vec<LogEntry>,
}

/// In-memory ledger hosting one [`CredentialRegistry`].
pub struct DevLedger {
    options: DevLedgerOptions,
    state: Mutex<ChainState>,
}

impl DevLedger {
    /// A fresh chain whose registry is administered by `admin`.
    pub fn new(admin: Address, options: DevLedgerOptions) -> Self {
        let state = ChainState {
            registry: CredentialRegistry::deploy(admin),
            balances: HashMap::new(),
            nonces: HashMap::new(),
            head_number: 0,
            head_timestamp: options.genesis_timestamp,
            receipts: HashMap::new(),
            logs: Vec::new(),
        };
        Self {
            options,
            state: Mutex::new(state),
        }
    }

    pub fn contract_address(&self) -> Address {
        REGISTRY_ADDRESS
    }

    pub fn options(&self) -> &DevLedgerOptions {
        &self.options
    }

    /// Credits `amount` wei to `account`.
    pub fn fund(&self, account: Address, amount: U256) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.state
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Authorizes `issuer` as `caller` without a transaction. For setup.
    pub fn authorize_issuer(&self, caller: Address, issuer: Address) -> Result<(), RegistryError> {
        self.state.lock().registry.authorize_issuer(caller, issuer)
    }

    /// Copy of the registry state.
    pub fn registry(&self) -> CredentialRegistry {
        self.state.lock().registry.clone()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().head_number
    }

    fn header(&self, state: &ChainState) -> BlockHeader {
        BlockHeader {
            number: state.head_number,
            base_fee_per_gas: self.options.base_fee,
            timestamp: state.head_timestamp,
        }
    }

    /// Runs `request` against a copy of the registry.
    fn simulate(&self, request: &CallRequest) -> Result<(u64, Execution), RegistryError> {
        let state = self.state.lock();
        let intrinsic = intrinsic_gas(&request.data);
        if request.to != REGISTRY_ADDRESS {
            return Ok((intrinsic, Execution::default()));
        }
        let mut registry = state.registry.clone();
        let caller = request.from.unwrap_or_default();
        let execution = registry.execute(caller, &request.data, state.head_timestamp)?;
        Ok((intrinsic + execution.gas, execution))
    }

    /// Price actually paid per unit of gas, or the reason the envelope is
    /// not acceptable on this chain.
    fn effective_gas_price(&self, fee: &FeeFields) -> Result<U256, String> {
        match (self.options.base_fee, fee) {
            (None, FeeFields::Dynamic { .. }) => {
                Err("transaction type not supported".to_string())
            }
            (None, FeeFields::Legacy { gas_price }) => Ok(*gas_price),
            (Some(base_fee), fee) => {
                if fee.price_ceiling() < base_fee {
                    return Err(format!(
                        "max fee per gas less than block base fee: {} < {base_fee}",
                        fee.price_ceiling()
                    ));
                }
                Ok(match fee {
                    FeeFields::Legacy { gas_price } => *gas_price,
                    FeeFields::Dynamic {
                        max_fee_per_gas,
                        max_priority_fee_per_gas,
                    } => (*max_fee_per_gas).min(base_fee + *max_priority_fee_per_gas),
                })
            }
        }
    }

    fn status(&self, success: bool) -> Option<StatusValue> {
        let bit = u64::from(success);
        match self.options.status_encoding {
            StatusEncoding::HexString => Some(StatusValue::Text(format!("0x{bit}"))),
            StatusEncoding::Decimal => Some(StatusValue::Text(bit.to_string())),
            StatusEncoding::Bool => Some(StatusValue::Bool(success)),
            StatusEncoding::Number => Some(StatusValue::Number(bit)),
            StatusEncoding::Big => Some(StatusValue::Big(U256::from(bit))),
            StatusEncoding::Absent => None,
        }
    }
}

fn intrinsic_gas(data: &[u8]) -> u64 {
    data.iter().fold(TX_BASE_GAS, |gas, b| {
        gas + if *b == 0 {
            TX_DATA_ZERO_GAS
        } else {
            TX_DATA_NONZERO_GAS
        }
    })
}

fn rejected(message: impl Into<String>) -> RpcClientError {
    RpcClientError::Rpc {
        method: RpcMethod::SendRawTransaction,
        error: RpcError::server_error(message),
    }
}

fn reverted(method: RpcMethod, reason: &RegistryError) -> RpcClientError {
    RpcClientError::Rpc {
        method,
        error: RpcError::new(EXECUTION_REVERTED_CODE, format!("execution reverted: {reason}")),
    }
}

fn decoded(event: &CredentialIssued) -> DecodedEvent {
    let mut return_values = BTreeMap::new();
    return_values.insert(
        CREDENTIAL_ID_FIELD.to_string(),
        json!(event.credentialId.to_string()),
    );
    return_values.insert("studentId".to_string(), json!(event.studentId));
    DecodedEvent {
        event: Some(CREDENTIAL_ISSUED_EVENT.to_string()),
        return_values,
    }
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerClient for DevLedger {
    async fn chain_id(&self) -> Result<u64, RpcClientError> {
        Ok(self.options.chain_id)
    }

    async fn latest_block(&self) -> Result<BlockHeader, RpcClientError> {
        let state = self.state.lock();
        Ok(self.header(&state))
    }

    async fn gas_price(&self) -> Result<U256, RpcClientError> {
        Ok(match self.options.base_fee {
            Some(base_fee) => base_fee + U256::from(GWEI),
            None => self.options.gas_price,
        })
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcClientError> {
        Ok(self.balance_of(address))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, RpcClientError> {
        Ok(if address == REGISTRY_ADDRESS {
            Bytes::from_static(REGISTRY_CODE)
        } else {
            Bytes::new()
        })
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, RpcClientError> {
        self.simulate(request)
            .map(|(_, execution)| execution.output)
            .map_err(|e| reverted(RpcMethod::Call, &e))
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcClientError> {
        self.simulate(request)
            .map(|(gas, _)| gas)
            .map_err(|e| reverted(RpcMethod::EstimateGas, &e))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcClientError> {
        Ok(self
            .state
            .lock()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or(0))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcClientError> {
        let signed = decode_signed_transaction(raw)
            .map_err(|e| rejected(format!("invalid transaction: {e}")))?;
        let tx = &signed.envelope;
        let hash = signed.hash;

        if tx.chain_id != self.options.chain_id {
            return Err(rejected(format!(
                "invalid chain id {} (expected {})",
                tx.chain_id, self.options.chain_id
            )));
        }
        let price = self.effective_gas_price(&tx.fee).map_err(rejected)?;

        let mut state = self.state.lock();
        if state.receipts.contains_key(&hash) {
            return Err(rejected("already known"));
        }

        let expected_nonce = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.nonce < expected_nonce {
            return Err(rejected(format!(
                "nonce too low: next nonce {expected_nonce}, tx nonce {}",
                tx.nonce
            )));
        }
        if tx.nonce > expected_nonce {
            return Err(rejected(format!(
                "nonce too high: next nonce {expected_nonce}, tx nonce {}",
                tx.nonce
            )));
        }

        let balance = state.balances.get(&tx.from).copied().unwrap_or_default();
        let upfront = tx.max_cost();
        if balance < upfront {
            return Err(rejected(format!(
                "insufficient funds for gas * price + value: address {} have {balance} \
                 want {upfront}",
                tx.from
            )));
        }

        // Mine it into the next block.
        let block_number = state.head_number + 1;
        let block_timestamp = state.head_timestamp + self.options.block_time_secs;
        state.head_number = block_number;
        state.head_timestamp = block_timestamp;

        let intrinsic = intrinsic_gas(&tx.data);
        let (success, gas_used, events) = if tx.to != REGISTRY_ADDRESS {
            (true, intrinsic, Vec::new())
        } else {
            let mut registry = state.registry.clone();
            match registry.execute(tx.from, &tx.data, block_timestamp) {
                Ok(execution) if intrinsic + execution.gas <= tx.gas_limit => {
                    state.registry = registry;
                    (true, intrinsic + execution.gas, execution.events)
                }
                Ok(_) => {
                    debug!(%hash, gas_limit = tx.gas_limit, "out of gas");
                    (false, tx.gas_limit, Vec::new())
                }
                Err(e) => {
                    debug!(%hash, reason = %e, "transaction reverted");
                    (false, intrinsic.min(tx.gas_limit), Vec::new())
                }
            }
        };

        let fee = U256::from(gas_used) * price;
        state.balances.insert(tx.from, balance - fee);
        state.nonces.insert(tx.from, expected_nonce + 1);

        let logs: Vec<LogEntry> = events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let data = event.encode_log_data();
                LogEntry {
                    address: REGISTRY_ADDRESS,
                    topics: data.topics().to_vec(),
                    data: data.data,
                    block_number: Some(block_number),
                    transaction_hash: Some(hash),
                    log_index: Some(index as u64),
                }
            })
            .collect();
        state.logs.extend(logs.iter().cloned());

        let receipt = TransactionReceipt {
            status: self.status(success),
            transaction_hash: hash,
            block_number,
            logs: match self.options.receipt_shape {
                ReceiptShape::NoLogs => Vec::new(),
                ReceiptShape::RawLogs | ReceiptShape::DecodedEvents => logs,
            },
            events: match self.options.receipt_shape {
                ReceiptShape::DecodedEvents => events
                    .iter()
                    .map(|e| (CREDENTIAL_ISSUED_EVENT.to_string(), decoded(e)))
                    .collect(),
                ReceiptShape::RawLogs | ReceiptShape::NoLogs => BTreeMap::new(),
            },
            gas_used: Some(gas_used),
        };
        state.receipts.insert(
            hash,
            StoredReceipt {
                receipt,
                polls_left: self.options.pending_polls,
            },
        );

        info!(
            %hash,
            from = %tx.from,
            block = block_number,
            success,
            gas_used,
            "devnet mined transaction"
        );
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcClientError> {
        let mut state = self.state.lock();
        let Some(stored) = state.receipts.get_mut(&hash) else {
            return Ok(None);
        };
        if stored.polls_left > 0 {
            stored.polls_left -= 1;
            return Ok(None);
        }
        Ok(Some(stored.receipt.clone()))
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcClientError> {
        if filter.from_block > filter.to_block {
            return Err(RpcClientError::Rpc {
                method: RpcMethod::GetLogs,
                error: RpcError::invalid_params("fromBlock is after toBlock"),
            });
        }
        let state = self.state.lock();
        Ok(state
            .logs
            .iter()
            .filter(|log| log.address == filter.address)
            .filter(|log| {
                log.block_number
                    .is_some_and(|b| b >= filter.from_block && b <= filter.to_block)
            })
            .filter(|log| {
                filter
                    .topics
                    .iter()
                    .enumerate()
                    .all(|(i, topic)| log.topics.get(i) == Some(topic))
            })
            .map(|log| LogEntry {
                transaction_hash: if self.options.logs_carry_tx_hash {
                    log.transaction_hash
                } else {
                    None
                },
                ..log.clone()
            })
            .collect())
    }
}
