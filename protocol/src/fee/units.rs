//! Display-unit conversion for wei amounts.
//!
//! All arithmetic in the pipeline stays in wei as [`U256`]. These helpers
//! exist for log lines and error messages only; nothing parses their output
//! back into a number.

use alloy_primitives::{utils, U256};

/// Decimals of one ether.
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals of one gwei.
pub const GWEI_DECIMALS: u8 = 9;

/// Renders `value / 10^decimals` as a plain decimal string with trailing
/// fractional zeros trimmed. `1_500_000_000` with 9 decimals is `"1.5"`.
/// Decimals beyond what a `U256` can scale fall back to the raw wei count.
pub fn format_units(value: &U256, decimals: u8) -> String {
    match utils::format_units(*value, decimals) {
        Ok(rendered) => trim_fraction(rendered),
        Err(_) => value.to_string(),
    }
}

fn trim_fraction(rendered: String) -> String {
    match rendered.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => rendered,
    }
}

/// Wei → ether, for humans.
pub fn format_ether(wei: &U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Wei → gwei, for humans.
pub fn format_gwei(wei: &U256) -> String {
    format_units(wei, GWEI_DECIMALS)
}
