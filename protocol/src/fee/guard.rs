//! Balance guard.
//!
//! Refuses to broadcast a transaction the issuer cannot pay for. The check
//! runs after gas estimation (an estimation failure is the cheaper, more
//! precise signal) and before the nonce is fetched.
//!
//! ```text
//! cost     = gas * price_ceiling
//! required = cost * 110 / 100
//! ```
//!
//! The 10% buffer absorbs fee drift between quoting and inclusion. It does
//! not make the check atomic: the head can move between the quote and the
//! broadcast, and the node may still reject the transaction.

use alloy_primitives::{Address, U256};

use crate::config::BALANCE_BUFFER_PERCENT;
use crate::error::PipelineError;
use crate::fee::strategy::FeeQuote;

/// Outcome of a passing balance check, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheck {
    /// Worst-case cost of the transaction in wei.
    pub cost: U256,
    /// Cost plus buffer in wei.
    pub required: U256,
    /// Balance observed at check time.
    pub balance: U256,
}

/// Worst-case cost of `gas` units under `quote`.
pub fn worst_case_cost(gas: u64, quote: &FeeQuote) -> U256 {
    U256::from(gas).saturating_mul(quote.price_ceiling())
}

/// Applies the safety buffer to a cost. `None` when the buffered cost does
/// not fit in 256 bits, which no account can cover.
pub fn with_buffer(cost: U256) -> Option<U256> {
    cost.checked_mul(U256::from(BALANCE_BUFFER_PERCENT))
        .map(|scaled| scaled / U256::from(100u64))
}

/// Verifies that `balance` covers `gas` under `quote` plus the buffer.
///
/// # Errors
///
/// [`PipelineError::InsufficientFunds`] carrying `shortfall = required - balance`.
pub fn ensure_sufficient_balance(
    account: Address,
    balance: U256,
    gas: u64,
    quote: &FeeQuote,
) -> Result<BalanceCheck, PipelineError> {
    let cost = worst_case_cost(gas, quote);
    let Some(required) = with_buffer(cost) else {
        return Err(PipelineError::InsufficientFunds {
            account,
            balance,
            required: U256::MAX,
            shortfall: U256::MAX - balance,
        });
    };

    if balance < required {
        return Err(PipelineError::InsufficientFunds {
            account,
            balance,
            required,
            shortfall: required - balance,
        });
    }

    Ok(BalanceCheck {
        cost,
        required,
        balance,
    })
}
