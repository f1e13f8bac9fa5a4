//! # Fees
//!
//! Gas pricing and affordability, in that order:
//!
//! ```text
//! strategy.rs — FeeStrategySelector: dynamic vs. legacy quote from the chain head
//! guard.rs    — BalanceGuard: cost * 110% against the issuer balance
//! units.rs    — wei → gwei/ether, for logs and messages only
//! ```
//!
//! Everything monetary is a [`U256`](alloy_primitives::U256) in wei. Native
//! `u64` tops out at ~18.4 ether, which a mainnet-sized balance can exceed.

pub mod guard;
pub mod strategy;
pub mod units;

pub use guard::{ensure_sufficient_balance, BalanceCheck};
pub use strategy::{select_fee_quote, FeeQuote, FeeStrategy};
pub use units::{format_ether, format_gwei};
