//! The ledger-assigned credential identifier.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Why a string is not a credential identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialIdError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),

    #[error("identifier contains non-hex characters")]
    NotHex,
}

/// A 32-byte identifier emitted by the registry in `CredentialIssued`.
///
/// Parses from 64 hex characters with or without `0x` (any case) and always
/// renders as `0x` followed by 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId(B256);

impl CredentialId {
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    pub fn parse(raw: &str) -> Result<Self, CredentialIdError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if body.len() != 64 {
            return Err(CredentialIdError::Length(body.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(body, &mut bytes).map_err(|_| CredentialIdError::NotHex)?;
        Ok(Self(B256::from(bytes)))
    }

    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl From<B256> for CredentialId {
    fn from(bytes: B256) -> Self {
        Self(bytes)
    }
}

impl From<CredentialId> for B256 {
    fn from(id: CredentialId) -> Self {
        id.0
    }
}

impl FromStr for CredentialId {
    type Err = CredentialIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({self})")
    }
}

impl Serialize for CredentialId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CredentialId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
