//! # Cryptographic Primitives
//!
//! Keccak-256 helpers and the issuer's secp256k1 key. Both are thin, typed
//! wrappers around audited implementations (`alloy-primitives` and `k256`);
//! nothing in here invents its own construction.

pub mod hash;
pub mod keys;

pub use hash::{credential_issued_topic, event_topic, function_selector, keccak_concat};
pub use keys::{address_of, IssuerKey, KeyError, RecoverableSignature};
