//! # CredChain Contracts
//!
//! Executable models of the on-chain side of credential issuance, for
//! development and tests:
//!
//! - **Credential Registry** — the `CredentialRegistry` contract: an admin,
//!   an authorized-issuer list, and credential records keyed by a 32-byte
//!   identifier derived at issuance.
//! - **Devnet** — an instantly-mining in-memory ledger hosting one registry
//!   and speaking the same `LedgerClient` interface as a real node.
//!
//! ## Design Principles
//!
//! 1. Calls go in as ABI calldata and come out as ABI return data, so the
//!    pipeline's encoders are exercised for real.
//! 2. Transactions are authenticated by signature recovery, never by a
//!    claimed sender.
//! 3. A revert leaves state untouched; simulations run on a copy.

pub mod credential_registry;
pub mod devnet;

pub use credential_registry::{CredentialRecord, CredentialRegistry, RegistryError};
pub use devnet::{DevLedger, DevLedgerOptions, ReceiptShape, StatusEncoding, REGISTRY_ADDRESS};
