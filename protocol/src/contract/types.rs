//! Caller-facing request and result types.

use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::CredentialId;

/// One credential to record on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub student_id: String,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    /// Content address (e.g. an IPFS CID) of the credential document,
    /// produced by the caller before issuance.
    pub content_address: String,
}

impl IssuanceRequest {
    /// Names of required fields that are empty or whitespace.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("student_id", &self.student_id),
            ("student_name", &self.student_name),
            ("degree", &self.degree),
            ("major", &self.major),
            ("content_address", &self.content_address),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Outcome of a confirmed issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceResult {
    pub credential_id: CredentialId,
    pub transaction_hash: B256,
    pub block_number: u64,
}

/// A credential record as the registry reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCredential {
    pub credential_id: CredentialId,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    pub issue_date: DateTime<Utc>,
    /// Ledger-side validity only. Off-chain revocation is the caller's
    /// business.
    pub is_valid: bool,
}
