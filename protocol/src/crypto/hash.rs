//! # Hashing Utilities
//!
//! Keccak-256 is the only hash the ledger speaks: it names events, selects
//! functions, derives addresses, and identifies transactions. Everything
//! here is a thin wrapper over `alloy_primitives`.

use alloy_primitives::{keccak256, Keccak256, B256};

use crate::config::CREDENTIAL_ISSUED_SIGNATURE;

/// Keccak-256 of a canonical event signature, i.e. the event's `topics[0]`.
///
/// ```
/// use credchain_protocol::crypto::event_topic;
///
/// let topic = event_topic("Transfer(address,address,uint256)");
/// assert!(format!("{topic}").starts_with("0xddf252ad"));
/// ```
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// First four bytes of the Keccak-256 of a function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `topics[0]` of every `CredentialIssued` log.
pub fn credential_issued_topic() -> B256 {
    event_topic(CREDENTIAL_ISSUED_SIGNATURE)
}

/// Keccak-256 over the concatenation of `parts`, without an intermediate
/// buffer.
pub fn keccak_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(*part);
    }
    hasher.finalize()
}
