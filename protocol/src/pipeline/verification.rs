//! Reading a credential record back from the registry.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::contract::abi::verifyCredentialCall;
use crate::contract::VerifiedCredential;
use crate::error::PipelineError;
use crate::identifier::CredentialId;
use crate::network::{CallRequest, LedgerClient};

/// Calls `verifyCredential(id)` and converts the record.
///
/// The registry reverts for unknown identifiers, but deployments differ:
/// some return nothing, some return a zeroed record. All three read as
/// [`PipelineError::NotFound`].
pub async fn read_credential<C>(
    client: &C,
    contract: Address,
    id: &CredentialId,
) -> Result<VerifiedCredential, PipelineError>
where
    C: LedgerClient + ?Sized,
{
    let call = verifyCredentialCall {
        credentialId: *id.as_b256(),
    };
    let request = CallRequest::new(contract, call.abi_encode());
    let data = match client.call(&request).await {
        Ok(data) => data,
        Err(e) if e.is_revert() => {
            debug!(credential_id = %id, error = %e, "verifyCredential reverted");
            return Err(PipelineError::NotFound(id.to_string()));
        }
        Err(e) => {
            return Err(PipelineError::Network(format!(
                "verifyCredential({id}) on {contract} failed: {e}"
            )))
        }
    };

    decode_record(id, &data)
}

/// Decodes the return tuple `(string, string, string, uint256, bool)`.
pub fn decode_record(id: &CredentialId, data: &Bytes) -> Result<VerifiedCredential, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::NotFound(id.to_string()));
    }

    let record = verifyCredentialCall::abi_decode_returns(data, true).map_err(|e| {
        PipelineError::Network(format!(
            "verifyCredential returned undecodable data ({} bytes): {e}",
            data.len()
        ))
    })?;

    let blank = record.studentName.is_empty()
        && record.degree.is_empty()
        && record.major.is_empty()
        && record.issueDate == U256::ZERO;
    if blank {
        return Err(PipelineError::NotFound(id.to_string()));
    }

    Ok(VerifiedCredential {
        credential_id: *id,
        student_name: record.studentName,
        degree: record.degree,
        major: record.major,
        issue_date: issue_date(record.issueDate)?,
        is_valid: record.isValid,
    })
}

fn issue_date(seconds: U256) -> Result<DateTime<Utc>, PipelineError> {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| PipelineError::Network(format!("issue date {seconds} is out of range")))
}
