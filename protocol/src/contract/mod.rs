//! # Registry Contract Interface
//!
//! ABI bindings for `CredentialRegistry` and the typed requests and results
//! that flow through the pipeline.

pub mod abi;
pub mod types;

pub use abi::ICredentialRegistry;
pub use types::{IssuanceRequest, IssuanceResult, VerifiedCredential};
