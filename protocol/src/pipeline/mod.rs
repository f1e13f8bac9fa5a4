//! # Credential Pipeline
//!
//! The caller-facing entry points: [`CredentialPipeline::issue_on_chain`]
//! records a credential on the registry and returns its identifier,
//! [`CredentialPipeline::verify_on_chain`] reads one back.
//!
//! ## Architecture
//!
//! ```text
//! authorization.rs  — Contract presence and issuer authorization checks
//! verification.rs   — verifyCredential call and record conversion
//! diagnostics.rs    — Operator health report for a deployment
//! ```
//!
//! ## Issuance Flow
//!
//! ```text
//!  request ─► code check ─► authorization ─► head + fee quote
//!                                                  │
//!     receipt ◄─ broadcast ◄─ sign ◄─ nonce ◄─ balance guard ◄─ estimate
//!        │
//!        └─► status ─► identifier extraction ─► IssuanceResult
//! ```
//!
//! Everything before the broadcast is read-only and can fail freely. After
//! the broadcast the transaction exists whether or not we see it mined.
//!
//! ## Design Decisions
//!
//! - The ledger client is injected, not discovered. The pipeline holds an
//!   `Arc` so one HTTP client can serve many concurrent requests.
//! - No retries anywhere. Two concurrent issuances from the same account
//!   may read the same pending nonce; one of them will be rejected by the
//!   node and surface as a `Network` error.

pub mod authorization;
pub mod diagnostics;
pub mod verification;

pub use authorization::{ensure_authorized, ensure_contract_deployed};
pub use diagnostics::{diagnose, ContractDiagnostics};
pub use verification::{decode_record, read_credential};

use std::sync::Arc;

use alloy_sol_types::SolCall;
use tracing::{info, info_span, Instrument};

use crate::config::LedgerConfig;
use crate::contract::abi::issueCredentialCall;
use crate::contract::{IssuanceRequest, IssuanceResult, VerifiedCredential};
use crate::error::PipelineError;
use crate::fee::select_fee_quote;
use crate::identifier::{extract_credential_id, CredentialId};
use crate::network::LedgerClient;
use crate::transaction::{interpret_receipt_status, TransactionSubmitter};

/// Issues and verifies credentials against one registry on behalf of one
/// issuing account.
pub struct CredentialPipeline<C: ?Sized> {
    client: Arc<C>,
    config: LedgerConfig,
}

impl<C: ?Sized> Clone for CredentialPipeline<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C> CredentialPipeline<C>
where
    C: LedgerClient + ?Sized,
{
    pub fn new(client: Arc<C>, config: LedgerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Records `request` on the registry and waits for confirmation.
    ///
    /// Fails with `Authorization` before spending anything if the issuer is
    /// not authorized, and with `InsufficientFunds` before broadcasting if
    /// the account cannot cover the quoted cost plus buffer.
    pub async fn issue_on_chain(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceResult, PipelineError> {
        let span = info_span!("issue", student_id = %request.student_id);
        self.issue_inner(request).instrument(span).await
    }

    async fn issue_inner(&self, request: &IssuanceRequest) -> Result<IssuanceResult, PipelineError> {
        let client = self.client.as_ref();
        let contract = self.config.contract_address;
        let issuer = self.config.issuer_address;

        info!(%contract, %issuer, "issuing credential");
        ensure_contract_deployed(client, contract).await?;
        ensure_authorized(client, contract, issuer).await?;

        let head = client
            .latest_block()
            .await
            .map_err(|e| PipelineError::Network(format!("failed to read latest block: {e}")))?;
        let quote = select_fee_quote(client, &head).await?;

        let call_data = issueCredentialCall {
            studentId: request.student_id.clone(),
            studentName: request.student_name.clone(),
            degree: request.degree.clone(),
            major: request.major.clone(),
            ipfsHash: request.content_address.clone(),
        }
        .abi_encode();

        let receipt = TransactionSubmitter::new(client, &self.config)
            .submit(call_data.into(), &quote)
            .await?;
        interpret_receipt_status(&receipt)?;

        let (credential_id, strategy) = extract_credential_id(client, contract, &receipt).await?;
        info!(
            %credential_id,
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number,
            %strategy,
            "credential issued"
        );

        Ok(IssuanceResult {
            credential_id,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }

    /// Reads the registry's record for `id`. No transaction, no gas.
    pub async fn verify_on_chain(
        &self,
        id: &CredentialId,
    ) -> Result<VerifiedCredential, PipelineError> {
        let record = read_credential(self.client.as_ref(), self.config.contract_address, id).await?;
        info!(credential_id = %id, is_valid = record.is_valid, "credential verified");
        Ok(record)
    }

    /// Operator health report for the configured registry and issuer.
    pub async fn check_contract(&self) -> Result<ContractDiagnostics, PipelineError> {
        diagnose(
            self.client.as_ref(),
            self.config.contract_address,
            self.config.issuer_address,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
