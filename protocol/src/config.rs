//! # Pipeline Configuration & Constants
//!
//! Every magic number the issuance pipeline depends on lives here, next to
//! the runtime configuration it is loaded with. If you find a hardcoded gwei
//! amount somewhere else, move it here.
//!
//! Runtime configuration ([`LedgerConfig`]) comes from the environment (or
//! CLI flags that fall back to the environment). It is validated once, at
//! construction, so the pipeline never discovers a malformed contract address
//! halfway through a submission.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::crypto::keys::IssuerKey;

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// 1 gwei in wei.
pub const GWEI: u64 = 1_000_000_000;

/// Floor for the dynamic-fee priority tip. The tip is the larger of this and
/// [`PRIORITY_FEE_BASE_DIVISOR`]-th of the base fee.
pub const MIN_PRIORITY_FEE_WEI: u64 = GWEI;

/// The priority tip is `base_fee / PRIORITY_FEE_BASE_DIVISOR` when that beats
/// the floor. 10 → 10% of the base fee.
pub const PRIORITY_FEE_BASE_DIVISOR: u64 = 10;

/// `max_fee = base_fee * BASE_FEE_MULTIPLIER + priority`. Doubling the base
/// fee survives six consecutive full blocks of base-fee growth.
pub const BASE_FEE_MULTIPLIER: u64 = 2;

/// Balance guard safety buffer, as a percentage of the quoted cost.
pub const BALANCE_BUFFER_PERCENT: u64 = 110;

/// Below this many wei the diagnostics report flags the issuer as running
/// low (0.01 ether).
pub const LOW_BALANCE_WARNING_WEI: u64 = 10_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Ledger Contract
// ---------------------------------------------------------------------------

/// Canonical signature of the issuance event. Its keccak-256 hash is the
/// first topic of every `CredentialIssued` log.
pub const CREDENTIAL_ISSUED_SIGNATURE: &str = "CredentialIssued(bytes32,string)";

/// Name under which structured receipts carry the decoded issuance event.
pub const CREDENTIAL_ISSUED_EVENT: &str = "CredentialIssued";

/// Field of the decoded issuance event holding the identifier.
pub const CREDENTIAL_ID_FIELD: &str = "credentialId";

/// Blocks searched on either side of the receipt block by the historical
/// identifier query. The window is `[block - 1, block + 1]`.
pub const HISTORICAL_QUERY_SPAN: u64 = 1;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long to wait for a broadcast transaction to be mined before giving
/// up. The transaction may still land afterwards; nobody rolls it back.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between `eth_getTransactionReceipt` polls.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Per-request timeout for the JSON-RPC transport.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound accepted for any timing override read from the environment.
pub const MAX_TIMING_OVERRIDE: Duration = Duration::from_secs(86_400);

// ---------------------------------------------------------------------------
// Environment Variables
// ---------------------------------------------------------------------------

pub const ENV_LEDGER_URL: &str = "BLOCKCHAIN_URL";
pub const ENV_CONTRACT_ADDRESS: &str = "CONTRACT_ADDRESS";
pub const ENV_ISSUER_ADDRESS: &str = "ADMIN_WALLET_ADDRESS";
pub const ENV_ISSUER_PRIVATE_KEY: &str = "ADMIN_PRIVATE_KEY";
pub const ENV_CONTENT_STORE_URL: &str = "IPFS_API_URL";
pub const ENV_CHAIN_ID: &str = "CHAIN_ID";
pub const ENV_CONFIRMATION_TIMEOUT_SECS: &str = "CONFIRMATION_TIMEOUT_SECS";
pub const ENV_RECEIPT_POLL_INTERVAL_MS: &str = "RECEIPT_POLL_INTERVAL_MS";
pub const ENV_RPC_TIMEOUT_SECS: &str = "RPC_TIMEOUT_SECS";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Problems found while assembling a [`LedgerConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid {
        /// Variable or field name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Issuer Secret
// ---------------------------------------------------------------------------

/// The issuer's hex-encoded private key, exactly as configured.
///
/// Held as a zeroizing string and only parsed into a signing key at the
/// moment a transaction is signed. `Debug` and `Display` never print it.
#[derive(Clone)]
pub struct IssuerSecret(Zeroizing<String>);

impl IssuerSecret {
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self(Zeroizing::new(hex_key.into()))
    }

    /// The raw hex string. Callers must not log it.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for IssuerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IssuerSecret(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Everything the pipeline needs to talk to the ledger on behalf of one
/// issuing account.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub ledger_url: Url,
    /// Address of the deployed `CredentialRegistry`.
    pub contract_address: Address,
    /// The issuing account. Must be authorized on the registry.
    pub issuer_address: Address,
    /// Private key of the issuing account.
    pub issuer_secret: IssuerSecret,
    /// Content-addressed storage endpoint the caller uploads documents to.
    /// The pipeline only records the resulting address; it never calls this.
    pub content_store_url: Option<Url>,
    /// Chain id for replay protection. Fetched from the node when `None`.
    pub chain_id: Option<u64>,
    /// Upper bound on the receipt wait after broadcast.
    pub confirmation_timeout: Duration,
    /// Interval between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Per-request JSON-RPC timeout.
    pub rpc_timeout: Duration,
}

impl LedgerConfig {
    /// Builds and validates a configuration from explicit values.
    ///
    /// Addresses accept any case; a mixed-case address must carry a valid
    /// EIP-55 checksum. The zero address is rejected as a contract address
    /// because it is what an undeployed `.env` template contains.
    pub fn new(
        ledger_url: &str,
        contract_address: &str,
        issuer_address: &str,
        issuer_secret: IssuerSecret,
    ) -> Result<Self, ConfigError> {
        let ledger_url = parse_url(ENV_LEDGER_URL, ledger_url)?;
        let contract_address = parse_address(ENV_CONTRACT_ADDRESS, contract_address)?;
        if contract_address == Address::ZERO {
            return Err(ConfigError::Invalid {
                name: ENV_CONTRACT_ADDRESS,
                reason: "zero address; deploy the registry and set its address".into(),
            });
        }
        let issuer_address = parse_address(ENV_ISSUER_ADDRESS, issuer_address)?;
        if issuer_secret.expose().trim().is_empty() {
            return Err(ConfigError::Missing(ENV_ISSUER_PRIVATE_KEY));
        }

        Ok(Self {
            ledger_url,
            contract_address,
            issuer_address,
            issuer_secret,
            content_store_url: None,
            chain_id: None,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        })
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup. Tests
    /// pass a closure over a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self::new(
            &required(ENV_LEDGER_URL)?,
            &required(ENV_CONTRACT_ADDRESS)?,
            &required(ENV_ISSUER_ADDRESS)?,
            IssuerSecret::new(required(ENV_ISSUER_PRIVATE_KEY)?),
        )?;

        if let Some(raw) = lookup(ENV_CONTENT_STORE_URL).filter(|v| !v.trim().is_empty()) {
            config.content_store_url = Some(parse_url(ENV_CONTENT_STORE_URL, &raw)?);
        }
        if let Some(raw) = lookup(ENV_CHAIN_ID) {
            config.chain_id = Some(parse_number(ENV_CHAIN_ID, &raw)?);
        }
        if let Some(raw) = lookup(ENV_CONFIRMATION_TIMEOUT_SECS) {
            config.confirmation_timeout = Duration::from_secs(parse_bounded(
                ENV_CONFIRMATION_TIMEOUT_SECS,
                &raw,
                MAX_TIMING_OVERRIDE.as_secs(),
            )?);
        }
        if let Some(raw) = lookup(ENV_RECEIPT_POLL_INTERVAL_MS) {
            config.receipt_poll_interval = Duration::from_millis(parse_bounded(
                ENV_RECEIPT_POLL_INTERVAL_MS,
                &raw,
                MAX_TIMING_OVERRIDE.as_millis() as u64,
            )?);
        }
        if let Some(raw) = lookup(ENV_RPC_TIMEOUT_SECS) {
            config.rpc_timeout = Duration::from_secs(parse_bounded(
                ENV_RPC_TIMEOUT_SECS,
                &raw,
                MAX_TIMING_OVERRIDE.as_secs(),
            )?);
        }

        Ok(config)
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn with_content_store_url(mut self, url: Url) -> Self {
        self.content_store_url = Some(url);
        self
    }

    /// Parses the issuer key and checks that it controls `issuer_address`.
    ///
    /// The parsed key is dropped straight away; signing parses it again.
    /// Long-running callers use this to fail at startup instead of on the
    /// first issuance.
    pub fn verify_issuer_key(&self) -> Result<(), ConfigError> {
        IssuerKey::from_hex_for(self.issuer_secret.expose(), self.issuer_address)
            .map(drop)
            .map_err(|e| ConfigError::Invalid {
                name: ENV_ISSUER_PRIVATE_KEY,
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Parses an address, enforcing the EIP-55 checksum only when the input is
/// mixed-case (all-lower and all-upper inputs carry no checksum).
pub fn parse_address(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mixed_case = body.chars().any(|c| c.is_ascii_lowercase())
        && body.chars().any(|c| c.is_ascii_uppercase());

    let parsed = if mixed_case {
        let prefixed = format!("0x{body}");
        Address::parse_checksummed(prefixed, None).map_err(|e| e.to_string())
    } else {
        Address::from_str(body).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| ConfigError::Invalid { name, reason })
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Parses a timing override that must lie in `1..=max`.
fn parse_bounded(name: &'static str, raw: &str, max: u64) -> Result<u64, ConfigError> {
    let value = parse_number(name, raw)?;
    if value == 0 || value > max {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be between 1 and {max}, got {value}"),
        });
    }
    Ok(value)
}

/// Minimum issuer balance below which diagnostics warn.
pub fn low_balance_threshold() -> U256 {
    U256::from(LOW_BALANCE_WARNING_WEI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const ISSUER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn complete_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_LEDGER_URL, "http://127.0.0.1:8545"),
            (ENV_CONTRACT_ADDRESS, CONTRACT),
            (ENV_ISSUER_ADDRESS, ISSUER),
            (ENV_ISSUER_PRIVATE_KEY, "0xabc"),
        ]
    }

    #[test]
    fn loads_complete_environment() {
        let cfg = LedgerConfig::from_lookup(env(&complete_env())).unwrap();
        assert_eq!(cfg.ledger_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(cfg.contract_address.to_string(), CONTRACT);
        assert_eq!(cfg.confirmation_timeout, DEFAULT_CONFIRMATION_TIMEOUT);
        assert!(cfg.chain_id.is_none());
    }

    #[test]
    fn missing_endpoint_is_reported_by_name() {
        let mut vars = complete_env();
        vars.retain(|(k, _)| *k != ENV_LEDGER_URL);
        let err = LedgerConfig::from_lookup(env(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_LEDGER_URL));
    }

    #[test]
    fn zero_contract_address_is_rejected() {
        let mut vars = complete_env();
        vars[1] = (
            ENV_CONTRACT_ADDRESS,
            "0x0000000000000000000000000000000000000000",
        );
        let err = LedgerConfig::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: ENV_CONTRACT_ADDRESS,
                ..
            }
        ));
    }

    #[test]
    fn bad_checksum_is_rejected() {
        // Flip the case of one letter in a valid checksummed address.
        let err = parse_address("X", "0x5fbDB2315678afecb367f032d93F642f64180aa3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn lowercase_address_needs_no_checksum() {
        let addr = parse_address("X", ISSUER).unwrap();
        assert_eq!(
            addr.to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn optional_overrides_are_applied() {
        let mut vars = complete_env();
        vars.push((ENV_CHAIN_ID, "1337"));
        vars.push((ENV_CONFIRMATION_TIMEOUT_SECS, "5"));
        vars.push((ENV_RECEIPT_POLL_INTERVAL_MS, "50"));
        vars.push((ENV_CONTENT_STORE_URL, "http://127.0.0.1:5001"));
        let cfg = LedgerConfig::from_lookup(env(&vars)).unwrap();
        assert_eq!(cfg.chain_id, Some(1337));
        assert_eq!(cfg.confirmation_timeout, Duration::from_secs(5));
        assert_eq!(cfg.receipt_poll_interval, Duration::from_millis(50));
        assert!(cfg.content_store_url.is_some());
    }

    #[test]
    fn timing_overrides_outside_one_day_are_invalid() {
        let cases = [
            (ENV_CONFIRMATION_TIMEOUT_SECS, "0"),
            (ENV_CONFIRMATION_TIMEOUT_SECS, "18446744073709551615"),
            (ENV_RPC_TIMEOUT_SECS, "0"),
            (ENV_RPC_TIMEOUT_SECS, "86401"),
            (ENV_RECEIPT_POLL_INTERVAL_MS, "0"),
            (ENV_RECEIPT_POLL_INTERVAL_MS, "86400001"),
        ];
        for (name, value) in cases {
            let mut vars = complete_env();
            vars.push((name, value));
            let err = LedgerConfig::from_lookup(env(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: n, .. } if n == name),
                "{name}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn timing_overrides_at_one_day_are_accepted() {
        let mut vars = complete_env();
        vars.push((ENV_CONFIRMATION_TIMEOUT_SECS, "86400"));
        vars.push((ENV_RPC_TIMEOUT_SECS, "1"));
        vars.push((ENV_RECEIPT_POLL_INTERVAL_MS, "86400000"));
        let cfg = LedgerConfig::from_lookup(env(&vars)).unwrap();
        assert_eq!(cfg.confirmation_timeout, MAX_TIMING_OVERRIDE);
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(1));
        assert_eq!(cfg.receipt_poll_interval, MAX_TIMING_OVERRIDE);
    }

    #[test]
    fn non_numeric_chain_id_is_invalid() {
        let mut vars = complete_env();
        vars.push((ENV_CHAIN_ID, "mainnet"));
        let err = LedgerConfig::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_CHAIN_ID, .. }));
    }

    #[test]
    fn issuer_key_must_control_the_issuer_address() {
        let cfg = LedgerConfig::from_lookup(env(&complete_env())).unwrap();
        assert!(matches!(
            cfg.verify_issuer_key(),
            Err(ConfigError::Invalid { name: ENV_ISSUER_PRIVATE_KEY, .. })
        ));

        let mut vars = complete_env();
        vars[3] = (
            ENV_ISSUER_PRIVATE_KEY,
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );
        let cfg = LedgerConfig::from_lookup(env(&vars)).unwrap();
        cfg.verify_issuer_key().unwrap();
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let secret = IssuerSecret::new("deadbeef");
        assert_eq!(format!("{secret:?}"), "IssuerSecret(<redacted>)");
        let cfg = LedgerConfig::from_lookup(env(&complete_env())).unwrap();
        assert!(!format!("{cfg:?}").contains("0xabc"));
    }

    #[test]
    fn fee_constants_sanity() {
        assert_eq!(MIN_PRIORITY_FEE_WEI, 1_000_000_000);
        assert!(BALANCE_BUFFER_PERCENT > 100);
    }
}
