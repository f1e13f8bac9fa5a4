//! Core type definitions for ledger transactions.
//!
//! The pipeline only ever sends one kind of transaction (a contract call
//! with zero value), so the vocabulary is small: which envelope format to
//! use, and the fee fields that go with it.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fee::{FeeQuote, FeeStrategy};

// ---------------------------------------------------------------------------
// TxFormat
// ---------------------------------------------------------------------------

/// Wire format of a signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxFormat {
    /// Pre-London RLP list, EIP-155 replay-protected.
    Legacy,
    /// Typed envelope `0x02`.
    Eip1559,
}

impl TxFormat {
    /// EIP-2718 type byte; `None` for untyped legacy transactions.
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            Self::Legacy => None,
            Self::Eip1559 => Some(0x02),
        }
    }
}

impl fmt::Display for TxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "Legacy"),
            Self::Eip1559 => write!(f, "Eip1559"),
        }
    }
}

// ---------------------------------------------------------------------------
// FeeFields
// ---------------------------------------------------------------------------

/// The pricing fields that go into an envelope. Unlike [`FeeQuote`], the
/// variants make it impossible to carry both models at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum FeeFields {
    Legacy {
        gas_price: U256,
    },
    Dynamic {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeFields {
    pub fn format(&self) -> TxFormat {
        match self {
            Self::Legacy { .. } => TxFormat::Legacy,
            Self::Dynamic { .. } => TxFormat::Eip1559,
        }
    }

    /// Highest per-gas price the sender can be charged.
    pub fn price_ceiling(&self) -> U256 {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Dynamic {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

impl From<&FeeQuote> for FeeFields {
    fn from(quote: &FeeQuote) -> Self {
        match quote.strategy {
            FeeStrategy::Legacy => Self::Legacy {
                gas_price: quote.gas_price.unwrap_or_default(),
            },
            FeeStrategy::Dynamic => Self::Dynamic {
                max_fee_per_gas: quote.max_fee_per_gas.unwrap_or_default(),
                max_priority_fee_per_gas: quote.max_priority_fee_per_gas.unwrap_or_default(),
            },
        }
    }
}
