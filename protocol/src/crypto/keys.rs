//! # Key Management
//!
//! secp256k1 keys for the issuing account.
//!
//! The issuer key is the one secret the pipeline handles. It is parsed from
//! configuration only when a transaction is about to be signed and dropped
//! right after; `k256` zeroizes the scalar on drop and the hex form we parse
//! it from lives in a `Zeroizing` buffer.
//!
//! ## Security considerations
//!
//! - `Debug` prints the derived address, never key material.
//! - Signatures are low-s normalised with an adjusted recovery id, so they
//!   are accepted by every post-Homestead node.
//! - Key generation uses the OS RNG.

use std::fmt;

use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from parsing keys or producing/recovering signatures.
///
/// Messages never echo the offending input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key: expected 32 bytes of hex")]
    InvalidSecretKey,

    #[error("private key derives {derived}, but the configured issuer is {configured}")]
    AddressMismatch {
        derived: Address,
        configured: Address,
    },

    #[error("signing failed")]
    Signing,

    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),
}

/// An ECDSA signature with its recovery bit, in the form transactions carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: U256,
    pub s: U256,
    /// Parity of the ephemeral public key's y coordinate.
    pub y_parity: bool,
}

impl RecoverableSignature {
    /// Recovers the signer address for `hash`.
    pub fn recover_address(&self, hash: &B256) -> Result<Address, KeyError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        bytes[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
        let signature = Signature::from_slice(&bytes)
            .map_err(|_| KeyError::InvalidSignature("r or s out of range"))?;
        let recovery_id = RecoveryId::from_byte(self.y_parity as u8)
            .ok_or(KeyError::InvalidSignature("bad recovery id"))?;
        let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
            .map_err(|_| KeyError::InvalidSignature("recovery failed"))?;
        Ok(address_of(&key))
    }
}

/// A secp256k1 private key bound to its ledger address.
pub struct IssuerKey {
    signing_key: SigningKey,
    address: Address,
}

impl IssuerKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Parses a hex private key, with or without `0x`.
    pub fn from_hex(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if body.len() != 64 {
            return Err(KeyError::InvalidSecretKey);
        }
        let bytes = Zeroizing::new(hex::decode(body).map_err(|_| KeyError::InvalidSecretKey)?);
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Parses a hex private key and checks it controls `expected`.
    pub fn from_hex_for(raw: &str, expected: Address) -> Result<Self, KeyError> {
        let key = Self::from_hex(raw)?;
        if key.address != expected {
            return Err(KeyError::AddressMismatch {
                derived: key.address,
                configured: expected,
            });
        }
        Ok(key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The account this key controls.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte digest.
    pub fn sign_hash(&self, hash: &B256) -> Result<RecoverableSignature, KeyError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|_| KeyError::Signing)?;
        let (r, s) = signature.split_bytes();
        Ok(RecoverableSignature {
            r: U256::from_be_slice(&r),
            s: U256::from_be_slice(&s),
            y_parity: recovery_id.is_y_odd(),
        })
    }

    /// The private key as `0x`-prefixed hex. Only the `keygen` command
    /// should ever need this.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let hex_body = Zeroizing::new(hex::encode(self.signing_key.to_bytes()));
        Zeroizing::new(format!("0x{}", hex_body.as_str()))
    }
}

impl fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuerKey(address={})", self.address)
    }
}

/// Ledger address of a public key: the last 20 bytes of the Keccak-256 of
/// the uncompressed point without its `0x04` tag.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
