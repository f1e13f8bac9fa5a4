// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CredChain Protocol — Core Library
//!
//! Records academic credentials on an EVM ledger and reads them back. A
//! credential goes in as a handful of strings plus the content address of
//! the signed document; what comes out is a 32-byte identifier anyone can
//! check against the `CredentialRegistry` contract without trusting us.
//!
//! The hard part is not the contract call. It is everything around it:
//! picking a fee model the chain actually runs, refusing to broadcast a
//! transaction the account cannot pay for, telling a revert from a success
//! when every client encodes `status` differently, and digging the
//! identifier out of a receipt that may or may not contain the event.
//!
//! ## Architecture
//!
//! - **config** — Ledger configuration, environment loading, protocol constants.
//! - **error** — The caller-facing error taxonomy.
//! - **crypto** — Keccak helpers and the secp256k1 issuer key.
//! - **contract** — Registry ABI bindings and request/result types.
//! - **network** — The `LedgerClient` seam, JSON-RPC types, HTTP client.
//! - **fee** — Fee strategy selection, balance guard, display units.
//! - **transaction** — Envelope building, signing, submission, receipts.
//! - **identifier** — Credential identifiers and their recovery from receipts.
//! - **pipeline** — `issue_on_chain` and `verify_on_chain`.
//!
//! ## Design Philosophy
//!
//! 1. One big-integer type for money (`U256` wei). Ether is for log lines.
//! 2. Fail before broadcasting whenever possible. After it, always say which
//!    transaction you are talking about.
//! 3. Never retry a state-changing call on our own.
//! 4. The private key is read at signing time and never printed.

pub mod config;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod fee;
pub mod identifier;
pub mod network;
pub mod pipeline;
pub mod transaction;

pub use config::{ConfigError, IssuerSecret, LedgerConfig};
pub use contract::{IssuanceRequest, IssuanceResult, VerifiedCredential};
pub use error::PipelineError;
pub use identifier::CredentialId;
pub use network::{HttpLedgerClient, LedgerClient};
pub use pipeline::{ContractDiagnostics, CredentialPipeline};
