//! Fee strategy selection.
//!
//! The chain head decides the pricing model. A header carrying
//! `baseFeePerGas` means the chain runs the dynamic (base fee + tip) market,
//! and the quote carries `maxFeePerGas` / `maxPriorityFeePerGas`. Anything
//! else falls back to a flat legacy `gasPrice` taken from the node's oracle.
//!
//! Quotes are computed fresh for every submission and never cached: a quote
//! from two blocks ago is a quote for a different market.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BASE_FEE_MULTIPLIER, MIN_PRIORITY_FEE_WEI, PRIORITY_FEE_BASE_DIVISOR};
use crate::error::PipelineError;
use crate::fee::units::format_gwei;
use crate::network::{BlockHeader, LedgerClient};

/// Which pricing model a quote was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStrategy {
    /// Base-fee-aware pricing with separate cap and tip.
    Dynamic,
    /// Flat gas price.
    Legacy,
}

impl std::fmt::Display for FeeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeStrategy::Dynamic => write!(f, "dynamic"),
            FeeStrategy::Legacy => write!(f, "legacy"),
        }
    }
}

/// A gas pricing decision for one pending transaction.
///
/// Exactly one field group is populated: `gas_price` for
/// [`FeeStrategy::Legacy`], the two dynamic fields for
/// [`FeeStrategy::Dynamic`]. The constructors enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub strategy: FeeStrategy,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeQuote {
    /// Dynamic quote from a base fee:
    ///
    /// - `priority = max(1 gwei, base_fee / 10)`
    /// - `max_fee  = base_fee * 2 + priority`
    pub fn dynamic(base_fee: U256) -> Self {
        let floor = U256::from(MIN_PRIORITY_FEE_WEI);
        let proportional = base_fee / U256::from(PRIORITY_FEE_BASE_DIVISOR);
        let priority = floor.max(proportional);
        let max_fee = base_fee
            .saturating_mul(U256::from(BASE_FEE_MULTIPLIER))
            .saturating_add(priority);

        Self {
            strategy: FeeStrategy::Dynamic,
            gas_price: None,
            max_fee_per_gas: Some(max_fee),
            max_priority_fee_per_gas: Some(priority),
        }
    }

    /// Legacy quote at a flat price.
    pub fn legacy(gas_price: U256) -> Self {
        Self {
            strategy: FeeStrategy::Legacy,
            gas_price: Some(gas_price),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }

    /// The most this quote can charge per unit of gas: the fee cap for
    /// dynamic quotes, the flat price for legacy ones. Used for the
    /// worst-case cost in the balance guard.
    pub fn price_ceiling(&self) -> U256 {
        match self.strategy {
            FeeStrategy::Dynamic => self.max_fee_per_gas.unwrap_or_default(),
            FeeStrategy::Legacy => self.gas_price.unwrap_or_default(),
        }
    }
}

/// Chooses a fee quote for the given chain head.
///
/// Only the legacy path touches the network (`eth_gasPrice`); the dynamic
/// path is pure arithmetic over the header.
pub async fn select_fee_quote<C>(client: &C, head: &BlockHeader) -> Result<FeeQuote, PipelineError>
where
    C: LedgerClient + ?Sized,
{
    let quote = match head.base_fee_per_gas {
        Some(base_fee) => {
            let quote = FeeQuote::dynamic(base_fee);
            debug!(
                block = head.number,
                base_fee_gwei = %format_gwei(&base_fee),
                max_fee_gwei = %format_gwei(&quote.price_ceiling()),
                "using dynamic fee strategy"
            );
            quote
        }
        None => {
            let gas_price = client
                .gas_price()
                .await
                .map_err(|e| PipelineError::Network(format!("eth_gasPrice failed: {e}")))?;
            debug!(
                block = head.number,
                gas_price_gwei = %format_gwei(&gas_price),
                "using legacy fee strategy"
            );
            FeeQuote::legacy(gas_price)
        }
    };
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockLedger;

    #[test]
    fn dynamic_quote_uses_ten_percent_tip_above_floor() {
        let quote = FeeQuote::dynamic(U256::from(100_000_000_000u64));
        assert_eq!(quote.strategy, FeeStrategy::Dynamic);
        assert_eq!(
            quote.max_priority_fee_per_gas,
            Some(U256::from(10_000_000_000u64))
        );
        assert_eq!(quote.max_fee_per_gas, Some(U256::from(210_000_000_000u64)));
        assert_eq!(quote.gas_price, None);
    }

    #[test]
    fn dynamic_quote_applies_one_gwei_floor() {
        // 10% of 2 gwei is 0.2 gwei, below the floor.
        let quote = FeeQuote::dynamic(U256::from(2_000_000_000u64));
        assert_eq!(
            quote.max_priority_fee_per_gas,
            Some(U256::from(1_000_000_000u64))
        );
        assert_eq!(quote.max_fee_per_gas, Some(U256::from(5_000_000_000u64)));
    }

    #[test]
    fn zero_base_fee_still_tips() {
        let quote = FeeQuote::dynamic(U256::ZERO);
        assert_eq!(quote.price_ceiling(), U256::from(1_000_000_000u64));
    }

    #[test]
    fn legacy_quote_ceiling_is_gas_price() {
        let quote = FeeQuote::legacy(U256::from(20_000_000_000u64));
        assert_eq!(quote.price_ceiling(), U256::from(20_000_000_000u64));
        assert!(quote.max_fee_per_gas.is_none());
    }

    #[tokio::test]
    async fn header_with_base_fee_never_queries_oracle() {
        let ledger = MockLedger::new();
        let head = BlockHeader {
            number: 10,
            base_fee_per_gas: Some(U256::from(100_000_000_000u64)),
            timestamp: 0,
        };
        let quote = select_fee_quote(&ledger, &head).await.unwrap();
        assert_eq!(quote.strategy, FeeStrategy::Dynamic);
        assert_eq!(ledger.calls("eth_gasPrice"), 0);
    }

    #[tokio::test]
    async fn header_without_base_fee_uses_oracle_price() {
        let ledger = MockLedger::new().with_gas_price(U256::from(7_000_000_000u64));
        let head = BlockHeader {
            number: 10,
            base_fee_per_gas: None,
            timestamp: 0,
        };
        let quote = select_fee_quote(&ledger, &head).await.unwrap();
        assert_eq!(quote, FeeQuote::legacy(U256::from(7_000_000_000u64)));
        assert_eq!(ledger.calls("eth_gasPrice"), 1);
    }
}
