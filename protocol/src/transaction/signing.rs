//! Transaction signing and raw-transaction decoding.
//!
//! Signing is a separate step from building because the key is loaded from
//! configuration only at the last moment. The signed form is what goes to
//! `eth_sendRawTransaction`; its Keccak-256 is the transaction hash.
//!
//! [`decode_signed_transaction`] is the inverse, used by in-process ledgers
//! that need to execute what the pipeline broadcasts. It recovers the sender
//! from the signature rather than trusting any claimed `from`.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Header};
use thiserror::Error;

use super::builder::{encode_list, TransactionEnvelope};
use super::types::FeeFields;
use crate::crypto::keys::{IssuerKey, KeyError, RecoverableSignature};

/// A signed envelope plus its wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub envelope: TransactionEnvelope,
    pub signature: RecoverableSignature,
    /// Bytes for `eth_sendRawTransaction`.
    pub raw: Bytes,
    /// `keccak256(raw)`.
    pub hash: B256,
}

/// Signs `envelope` with `key`.
///
/// The envelope's `from` must be the key's address; a mismatch would
/// produce a transaction the node attributes to someone else.
pub fn sign_envelope(
    envelope: &TransactionEnvelope,
    key: &IssuerKey,
) -> Result<SignedTransaction, KeyError> {
    if envelope.from != key.address() {
        return Err(KeyError::AddressMismatch {
            derived: key.address(),
            configured: envelope.from,
        });
    }

    let signature = key.sign_hash(&envelope.signing_hash())?;
    let raw = encode_signed(envelope, &signature);
    let hash = keccak256(&raw);

    Ok(SignedTransaction {
        envelope: envelope.clone(),
        signature,
        raw: raw.into(),
        hash,
    })
}

fn encode_signed(envelope: &TransactionEnvelope, sig: &RecoverableSignature) -> Vec<u8> {
    let value = U256::ZERO;
    match envelope.fee {
        FeeFields::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let access_list: Vec<Bytes> = Vec::new();
            let y_parity = sig.y_parity as u8;
            let mut out = vec![0x02];
            encode_list(
                &[
                    &envelope.chain_id,
                    &envelope.nonce,
                    &max_priority_fee_per_gas,
                    &max_fee_per_gas,
                    &envelope.gas_limit,
                    &envelope.to,
                    &value,
                    &envelope.data,
                    &access_list,
                    &y_parity,
                    &sig.r,
                    &sig.s,
                ],
                &mut out,
            );
            out
        }
        FeeFields::Legacy { gas_price } => {
            let v = sig.y_parity as u64 + envelope.chain_id * 2 + 35;
            let mut out = Vec::new();
            encode_list(
                &[
                    &envelope.nonce,
                    &gas_price,
                    &envelope.gas_limit,
                    &envelope.to,
                    &value,
                    &envelope.data,
                    &v,
                    &sig.r,
                    &sig.s,
                ],
                &mut out,
            );
            out
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxDecodeError {
    #[error("empty transaction")]
    Empty,

    #[error("unsupported transaction type 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("malformed RLP: {0}")]
    Rlp(String),

    #[error("contract creation is not supported")]
    ContractCreation,

    #[error("non-zero value transfers are not supported")]
    NonZeroValue,

    #[error("legacy transaction without EIP-155 replay protection (v = {0})")]
    PreEip155(u64),

    #[error("trailing bytes after transaction")]
    TrailingBytes,

    #[error(transparent)]
    Signature(#[from] KeyError),
}

impl From<alloy_rlp::Error> for TxDecodeError {
    fn from(err: alloy_rlp::Error) -> Self {
        TxDecodeError::Rlp(err.to_string())
    }
}

/// Decodes a raw signed transaction and recovers its sender.
pub fn decode_signed_transaction(raw: &[u8]) -> Result<SignedTransaction, TxDecodeError> {
    let (envelope_without_sender, signature) = match raw.first() {
        None => return Err(TxDecodeError::Empty),
        Some(0x02) => decode_dynamic(&raw[1..])?,
        Some(b) if *b >= 0xc0 => decode_legacy(raw)?,
        Some(b) => return Err(TxDecodeError::UnsupportedType(*b)),
    };

    let from = signature.recover_address(&envelope_without_sender.signing_hash())?;
    let envelope = TransactionEnvelope {
        from,
        ..envelope_without_sender
    };

    Ok(SignedTransaction {
        envelope,
        signature,
        raw: Bytes::copy_from_slice(raw),
        hash: keccak256(raw),
    })
}

fn decode_dynamic(
    mut buf: &[u8],
) -> Result<(TransactionEnvelope, RecoverableSignature), TxDecodeError> {
    let body = list_body(&mut buf)?;
    let mut b = body;

    let chain_id = u64::decode(&mut b)?;
    let nonce = u64::decode(&mut b)?;
    let max_priority_fee_per_gas = U256::decode(&mut b)?;
    let max_fee_per_gas = U256::decode(&mut b)?;
    let gas_limit = u64::decode(&mut b)?;
    let to = decode_to(&mut b)?;
    let value = U256::decode(&mut b)?;
    let data = Bytes::decode(&mut b)?;
    // Access list: accepted and ignored.
    let _ = list_body(&mut b)?;
    let y_parity = u8::decode(&mut b)?;
    let r = U256::decode(&mut b)?;
    let s = U256::decode(&mut b)?;
    if !b.is_empty() || !buf.is_empty() {
        return Err(TxDecodeError::TrailingBytes);
    }
    if value != U256::ZERO {
        return Err(TxDecodeError::NonZeroValue);
    }

    let envelope = TransactionEnvelope {
        from: Address::ZERO,
        to,
        data,
        gas_limit,
        nonce,
        chain_id,
        fee: FeeFields::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        },
    };
    let signature = RecoverableSignature {
        r,
        s,
        y_parity: y_parity == 1,
    };
    Ok((envelope, signature))
}

fn decode_legacy(
    mut buf: &[u8],
) -> Result<(TransactionEnvelope, RecoverableSignature), TxDecodeError> {
    let body = list_body(&mut buf)?;
    let mut b = body;

    let nonce = u64::decode(&mut b)?;
    let gas_price = U256::decode(&mut b)?;
    let gas_limit = u64::decode(&mut b)?;
    let to = decode_to(&mut b)?;
    let value = U256::decode(&mut b)?;
    let data = Bytes::decode(&mut b)?;
    let v = u64::decode(&mut b)?;
    let r = U256::decode(&mut b)?;
    let s = U256::decode(&mut b)?;
    if !b.is_empty() || !buf.is_empty() {
        return Err(TxDecodeError::TrailingBytes);
    }
    if value != U256::ZERO {
        return Err(TxDecodeError::NonZeroValue);
    }
    if v < 35 {
        return Err(TxDecodeError::PreEip155(v));
    }

    let envelope = TransactionEnvelope {
        from: Address::ZERO,
        to,
        data,
        gas_limit,
        nonce,
        chain_id: (v - 35) / 2,
        fee: FeeFields::Legacy { gas_price },
    };
    let signature = RecoverableSignature {
        r,
        s,
        y_parity: (v - 35) % 2 == 1,
    };
    Ok((envelope, signature))
}

/// Consumes a list header and returns the list's payload.
fn list_body<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], TxDecodeError> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(TxDecodeError::Rlp("expected a list".into()));
    }
    if buf.len() < header.payload_length {
        return Err(TxDecodeError::Rlp("list payload overruns input".into()));
    }
    let whole: &'a [u8] = buf;
    let (body, rest) = whole.split_at(header.payload_length);
    *buf = rest;
    Ok(body)
}

/// `to` is an empty string for contract creation, which we never send.
fn decode_to(buf: &mut &[u8]) -> Result<Address, TxDecodeError> {
    if buf.first() == Some(&0x80) {
        return Err(TxDecodeError::ContractCreation);
    }
    Ok(Address::decode(buf)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
