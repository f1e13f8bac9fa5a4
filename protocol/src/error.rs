//! Error taxonomy for the issuance and verification pipeline.
//!
//! Every pipeline failure surfaces as exactly one [`PipelineError`]. The
//! pipeline never retries: once a transaction has been broadcast, a blind
//! retry risks a second credential for the same request. Retry policy and
//! user-facing wording belong to the caller.

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

use crate::config::ConfigError;
use crate::fee::units::format_ether;

/// Errors that abort an issuance or verification call.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid endpoint, contract address, key, or other setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The issuing account is not on the registry's authorized list.
    #[error(
        "account {issuer} is not authorized to issue credentials on registry {contract}; \
         authorize it with authorizeIssuer first"
    )]
    Authorization {
        /// The rejected issuer.
        issuer: Address,
        /// Registry that was consulted.
        contract: Address,
    },

    /// `eth_estimateGas` failed. The real call would almost certainly revert.
    #[error("gas estimation failed, the transaction would likely revert: {0}")]
    GasEstimation(String),

    /// Balance does not cover the quoted cost plus the safety buffer.
    #[error(
        "insufficient funds for {account}: balance {} ETH, required (with buffer) {} ETH, \
         shortfall {} ETH",
        format_ether(.balance),
        format_ether(.required),
        format_ether(.shortfall)
    )]
    InsufficientFunds {
        /// Account that would pay for gas.
        account: Address,
        /// Current balance in wei.
        balance: U256,
        /// Quoted cost plus buffer, in wei.
        required: U256,
        /// `required - balance`, in wei.
        shortfall: U256,
    },

    /// Transport failure, node-side rejection, or confirmation timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The transaction was mined but execution failed.
    #[error(
        "transaction {transaction_hash} reverted in block {block_number}; \
         the ledger returned no revert reason"
    )]
    TransactionReverted {
        /// Hash of the failed transaction.
        transaction_hash: B256,
        /// Block that included it.
        block_number: u64,
    },

    /// Every identifier recovery strategy came up empty.
    #[error("failed to extract credential id from receipt: {0}")]
    IdentifierExtraction(String),

    /// The registry has no record for the requested identifier.
    #[error("credential not found: {0}")]
    NotFound(String),
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

impl PipelineError {
    /// Short stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Authorization { .. } => "authorization",
            PipelineError::GasEstimation(_) => "gas_estimation",
            PipelineError::InsufficientFunds { .. } => "insufficient_funds",
            PipelineError::Network(_) => "network",
            PipelineError::TransactionReverted { .. } => "transaction_reverted",
            PipelineError::IdentifierExtraction(_) => "identifier_extraction",
            PipelineError::NotFound(_) => "not_found",
        }
    }
}
