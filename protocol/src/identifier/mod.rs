//! # Credential Identifiers
//!
//! The [`CredentialId`] type and the ordered strategies that recover it from
//! an issuance receipt.

pub mod extractor;
pub mod id;

pub use extractor::{extract_credential_id, ExtractionDiagnostics, ExtractionStrategy};
pub use id::{CredentialId, CredentialIdError};
