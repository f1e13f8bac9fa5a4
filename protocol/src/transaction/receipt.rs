//! Transaction receipts and status interpretation.
//!
//! A receipt is what the ledger hands back once a transaction is mined. Its
//! `status` field is the only signal of whether execution succeeded, and
//! depending on which client produced it, that signal arrives as a boolean,
//! a number, a decimal or hex string, or a 256-bit integer. This module
//! normalises every one of those into a [`ReceiptStatus`].

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::error::PipelineError;
use crate::network::quantity;

// ---------------------------------------------------------------------------
// Status encodings
// ---------------------------------------------------------------------------

/// The receipt status exactly as the client encoded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
    Bool(bool),
    Number(u64),
    /// `"0"`, `"1"`, `"0x0"`, `"0x1"`, in any case.
    Text(String),
    /// Arbitrary-precision integer, as in-process clients report it.
    Big(U256),
}

/// Normalised execution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failure,
}

impl StatusValue {
    /// Maps the encoding onto success or failure. Returns `None` for values
    /// that are neither zero nor one in any recognised form.
    pub fn interpret(&self) -> Option<ReceiptStatus> {
        let numeric = match self {
            StatusValue::Bool(true) => return Some(ReceiptStatus::Success),
            StatusValue::Bool(false) => return Some(ReceiptStatus::Failure),
            StatusValue::Number(n) => Some(*n),
            StatusValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(1),
                "false" => Some(0),
                other => quantity::parse_u64(other),
            },
            StatusValue::Big(v) => u64::try_from(*v).ok(),
        };

        match numeric {
            Some(0) => Some(ReceiptStatus::Failure),
            Some(1) => Some(ReceiptStatus::Success),
            _ => None,
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Bool(b) => write!(f, "{b}"),
            StatusValue::Number(n) => write!(f, "{n}"),
            StatusValue::Text(s) => write!(f, "{s:?}"),
            StatusValue::Big(v) => write!(f, "{v}n"),
        }
    }
}

impl Serialize for StatusValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatusValue::Bool(b) => serializer.serialize_bool(*b),
            StatusValue::Number(n) => serializer.serialize_u64(*n),
            StatusValue::Text(s) => serializer.serialize_str(s),
            StatusValue::Big(v) => serializer.serialize_str(&format!("0x{v:x}")),
        }
    }
}

impl<'de> Deserialize<'de> for StatusValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = StatusValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean, integer, or string receipt status")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<StatusValue, E> {
                Ok(StatusValue::Bool(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<StatusValue, E> {
                Ok(StatusValue::Number(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<StatusValue, E> {
                u64::try_from(v)
                    .map(StatusValue::Number)
                    .map_err(|_| E::custom(format!("negative status {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StatusValue, E> {
                Ok(StatusValue::Text(v.to_string()))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// A raw event log as emitted by the EVM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Contract that emitted the log.
    pub address: Address,
    /// `topics[0]` is the event signature hash; the rest are indexed fields.
    #[serde(default)]
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields.
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

/// An event some client libraries decode into the receipt for you.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub return_values: BTreeMap<String, serde_json::Value>,
}

/// Confirmation record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Missing on pre-Byzantium chains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusValue>,
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub block_number: u64,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Pre-decoded events keyed by event name. Standard JSON-RPC nodes never
    /// send this; richer client bindings do.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, DecodedEvent>,
    #[serde(default, with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Decides whether the receipt reports a successful execution.
///
/// - Any recognised "false" encoding → [`PipelineError::TransactionReverted`].
/// - A missing status (pre-Byzantium) → success; those chains signal failure
///   only through gas exhaustion and the extractor will find no event.
/// - An unrecognised encoding → treated as a revert. Guessing success here
///   would hand out an identifier for a credential that may not exist.
pub fn interpret_receipt_status(receipt: &TransactionReceipt) -> Result<(), PipelineError> {
    let reverted = || PipelineError::TransactionReverted {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
    };

    match receipt.status.as_ref() {
        None => Ok(()),
        Some(value) => match value.interpret() {
            Some(ReceiptStatus::Success) => Ok(()),
            Some(ReceiptStatus::Failure) => Err(reverted()),
            None => {
                warn!(
                    tx_hash = %receipt.transaction_hash,
                    status = %value,
                    "unrecognised receipt status encoding, treating as reverted"
                );
                Err(reverted())
            }
        },
    }
}
