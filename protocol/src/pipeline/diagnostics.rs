//! Read-only health report for a registry deployment.
//!
//! Answers the questions an operator asks when issuance fails on a fresh
//! environment: is the contract deployed at that address, who administers
//! it, is our account authorized, and can it pay for gas.

use std::fmt;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::Serialize;
use tracing::warn;

use crate::config::low_balance_threshold;
use crate::contract::abi::adminCall;
use crate::error::PipelineError;
use crate::fee::units::format_ether;
use crate::network::{CallRequest, LedgerClient};

use super::authorization::{ensure_authorized, ensure_contract_deployed};

/// Snapshot of a registry deployment as seen by the configured issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDiagnostics {
    pub contract: Address,
    pub issuer: Address,
    pub code_size: usize,
    /// `None` when `admin()` could not be read.
    pub admin: Option<Address>,
    pub issuer_is_admin: bool,
    pub issuer_authorized: bool,
    pub issuer_balance: U256,
    pub low_balance: bool,
}

impl fmt::Display for ContractDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "registry:          {}", self.contract)?;
        writeln!(f, "code size:         {} bytes", self.code_size)?;
        match self.admin {
            Some(admin) => writeln!(f, "admin:             {admin}")?,
            None => writeln!(f, "admin:             <unreadable>")?,
        }
        writeln!(f, "issuer:            {}", self.issuer)?;
        writeln!(f, "issuer is admin:   {}", self.issuer_is_admin)?;
        writeln!(f, "issuer authorized: {}", self.issuer_authorized)?;
        write!(f, "issuer balance:    {} ETH", format_ether(&self.issuer_balance))?;
        if self.low_balance {
            write!(
                f,
                "\nwarning: balance is below {} ETH; issuance may fail",
                format_ether(&low_balance_threshold())
            )?;
        }
        Ok(())
    }
}

/// Builds a [`ContractDiagnostics`].
///
/// Missing code is an error. Everything after that is reported rather than
/// raised, so one run shows every problem at once.
pub async fn diagnose<C>(
    client: &C,
    contract: Address,
    issuer: Address,
) -> Result<ContractDiagnostics, PipelineError>
where
    C: LedgerClient + ?Sized,
{
    let code_size = ensure_contract_deployed(client, contract).await?;

    let admin = match client
        .call(&CallRequest::new(contract, adminCall {}.abi_encode()))
        .await
    {
        Ok(data) => match adminCall::abi_decode_returns(&data, true) {
            Ok(ret) => Some(ret._0),
            Err(e) => {
                warn!(%contract, error = %e, "admin() returned undecodable data");
                None
            }
        },
        Err(e) => {
            warn!(%contract, error = %e, "admin() call failed");
            None
        }
    };

    let issuer_authorized = match ensure_authorized(client, contract, issuer).await {
        Ok(()) => true,
        Err(PipelineError::Authorization { .. }) => false,
        Err(e) => return Err(e),
    };

    let issuer_balance = client
        .balance(issuer)
        .await
        .map_err(|e| PipelineError::Network(format!("failed to read issuer balance: {e}")))?;
    let low_balance = issuer_balance < low_balance_threshold();
    if low_balance {
        warn!(
            %issuer,
            balance_eth = %format_ether(&issuer_balance),
            "issuer balance is low"
        );
    }

    Ok(ContractDiagnostics {
        contract,
        issuer,
        code_size,
        admin,
        issuer_is_admin: admin == Some(issuer),
        issuer_authorized,
        issuer_balance,
        low_balance,
    })
}
