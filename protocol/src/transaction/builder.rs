//! Envelope construction via the builder pattern.
//!
//! The [`EnvelopeBuilder`] enforces a disciplined construction flow: set the
//! fields gathered from the ledger, call `.build()`, and get back an unsigned
//! [`TransactionEnvelope`] whose signing hash is fixed by its contents.
//!
//! The builder does not sign; that happens in [`super::signing`]. This
//! separation keeps construction testable without key material.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{BufMut, Encodable, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{FeeFields, TxFormat};

/// A required field was never set on the builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transaction envelope is missing {0}")]
pub struct EnvelopeError(pub &'static str);

// ---------------------------------------------------------------------------
// TransactionEnvelope
// ---------------------------------------------------------------------------

/// An unsigned contract call, ready to be signed.
///
/// Value is always zero: the registry is not payable and the pipeline never
/// moves funds.
///
/// # Signing payloads
///
/// - [`TxFormat::Eip1559`]: `keccak(0x02 ‖ rlp[chain_id, nonce,
///   max_priority_fee, max_fee, gas_limit, to, 0, data, []])`
/// - [`TxFormat::Legacy`]: `keccak(rlp[nonce, gas_price, gas_limit, to, 0,
///   data, chain_id, 0, 0])` (EIP-155)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub nonce: u64,
    pub chain_id: u64,
    pub fee: FeeFields,
}

impl TransactionEnvelope {
    pub fn format(&self) -> TxFormat {
        self.fee.format()
    }

    /// The bytes whose hash is signed.
    pub fn signing_payload(&self) -> Vec<u8> {
        let value = U256::ZERO;
        match self.fee {
            FeeFields::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let access_list: Vec<Bytes> = Vec::new();
                let mut out = vec![0x02];
                encode_list(
                    &[
                        &self.chain_id,
                        &self.nonce,
                        &max_priority_fee_per_gas,
                        &max_fee_per_gas,
                        &self.gas_limit,
                        &self.to,
                        &value,
                        &self.data,
                        &access_list,
                    ],
                    &mut out,
                );
                out
            }
            FeeFields::Legacy { gas_price } => {
                let mut out = Vec::new();
                encode_list(
                    &[
                        &self.nonce,
                        &gas_price,
                        &self.gas_limit,
                        &self.to,
                        &value,
                        &self.data,
                        &self.chain_id,
                        &0u8,
                        &0u8,
                    ],
                    &mut out,
                );
                out
            }
        }
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }

    /// Worst-case fee in wei: `gas_limit * price_ceiling`.
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_limit).saturating_mul(self.fee.price_ceiling())
    }
}

/// Writes `fields` as one RLP list.
pub(crate) fn encode_list(fields: &[&dyn Encodable], out: &mut dyn BufMut) {
    let payload_length: usize = fields.iter().map(|f| f.length()).sum();
    Header {
        list: true,
        payload_length,
    }
    .encode(out);
    for field in fields {
        field.encode(out);
    }
}

// ---------------------------------------------------------------------------
// EnvelopeBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`TransactionEnvelope`].
///
/// # Usage
///
/// ```rust
/// use alloy_primitives::{Address, U256};
/// use credchain_protocol::fee::FeeQuote;
/// use credchain_protocol::transaction::EnvelopeBuilder;
///
/// let envelope = EnvelopeBuilder::new(Address::repeat_byte(1), Address::repeat_byte(2))
///     .data(vec![0xde, 0xad, 0xbe, 0xef])
///     .gas_limit(120_000)
///     .nonce(7)
///     .chain_id(1337)
///     .fee_quote(&FeeQuote::dynamic(U256::from(1_000_000_000u64)))
///     .build()
///     .unwrap();
/// assert_eq!(envelope.nonce, 7);
/// ```
///
/// `gas_limit`, `chain_id` and the fee are required; `build()` reports the
/// first one that is missing. `data` defaults to empty and `nonce` to zero.
pub struct EnvelopeBuilder {
    from: Address,
    to: Address,
    data: Bytes,
    gas_limit: Option<u64>,
    nonce: u64,
    chain_id: Option<u64>,
    fee: Option<FeeFields>,
}

impl EnvelopeBuilder {
    pub fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            data: Bytes::new(),
            gas_limit: None,
            nonce: 0,
            chain_id: None,
            fee: None,
        }
    }

    /// Sets the ABI-encoded call data.
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn gas_limit(mut self, gas: u64) -> Self {
        self.gas_limit = Some(gas);
        self
    }

    /// Sets the sender's nonce. Fetch it as `pending` right before building.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn fees(mut self, fee: FeeFields) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Takes the fee fields from a quote; the quote's strategy picks the
    /// envelope format.
    pub fn fee_quote(self, quote: &crate::fee::FeeQuote) -> Self {
        self.fees(FeeFields::from(quote))
    }

    pub fn build(self) -> Result<TransactionEnvelope, EnvelopeError> {
        Ok(TransactionEnvelope {
            from: self.from,
            to: self.to,
            data: self.data,
            gas_limit: self.gas_limit.ok_or(EnvelopeError("gas limit"))?,
            nonce: self.nonce,
            chain_id: self.chain_id.ok_or(EnvelopeError("chain id"))?,
            fee: self.fee.ok_or(EnvelopeError("fee fields"))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
