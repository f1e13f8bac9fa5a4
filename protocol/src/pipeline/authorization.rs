//! Read-only checks that gate an issuance before any gas is spent.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::contract::abi::authorizedIssuersCall;
use crate::error::PipelineError;
use crate::network::{CallRequest, LedgerClient};

/// Confirms `issuer` is on the registry's authorized list.
///
/// A `false` answer is an [`PipelineError::Authorization`]. A call that
/// fails outright (nothing deployed there, a different ABI, a node error)
/// is a [`PipelineError::Network`] naming the contract, since the registry
/// never answered the question.
pub async fn ensure_authorized<C>(
    client: &C,
    contract: Address,
    issuer: Address,
) -> Result<(), PipelineError>
where
    C: LedgerClient + ?Sized,
{
    let call = authorizedIssuersCall { issuer };
    let request = CallRequest::new(contract, call.abi_encode());
    let data = client.call(&request).await.map_err(|e| {
        PipelineError::Network(format!(
            "authorizedIssuers({issuer}) on {contract} failed; check CONTRACT_ADDRESS \
             and the deployed ABI: {e}"
        ))
    })?;

    let authorized = authorizedIssuersCall::abi_decode_returns(&data, true)
        .map_err(|e| {
            PipelineError::Network(format!(
                "authorizedIssuers on {contract} returned undecodable data ({} bytes): {e}",
                data.len()
            ))
        })?
        ._0;

    debug!(%issuer, %contract, authorized, "issuer authorization checked");
    if authorized {
        Ok(())
    } else {
        Err(PipelineError::Authorization { issuer, contract })
    }
}

/// Confirms there is contract code at `contract`.
///
/// An undeployed address answers every `eth_call` with empty data, which
/// would otherwise surface much later as a confusing decode failure.
pub async fn ensure_contract_deployed<C>(client: &C, contract: Address) -> Result<usize, PipelineError>
where
    C: LedgerClient + ?Sized,
{
    let code = client.code_at(contract).await.map_err(|e| {
        PipelineError::Network(format!("failed to read contract code at {contract}: {e}"))
    })?;

    if code.is_empty() || code.iter().all(|b| *b == 0) {
        return Err(PipelineError::Configuration(format!(
            "no contract code at {contract}; deploy CredentialRegistry or fix CONTRACT_ADDRESS"
        )));
    }
    Ok(code.len())
}
