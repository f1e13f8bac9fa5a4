//! # CLI Interface
//!
//! Defines the command-line argument structure for `credchain-node` using
//! `clap` derive. Subcommands: `issue`, `verify`, `check`, `keygen`,
//! `serve`, and `version`.
//!
//! Ledger settings come from flags first and the environment second, using
//! the same variable names as the `.env` files the registry deployment
//! scripts write (`BLOCKCHAIN_URL`, `CONTRACT_ADDRESS`, ...).

use std::collections::HashMap;
use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use credchain_protocol::config::{
    ENV_CHAIN_ID, ENV_CONFIRMATION_TIMEOUT_SECS, ENV_CONTENT_STORE_URL, ENV_CONTRACT_ADDRESS,
    ENV_ISSUER_ADDRESS, ENV_ISSUER_PRIVATE_KEY, ENV_LEDGER_URL, ENV_RECEIPT_POLL_INTERVAL_MS,
    ENV_RPC_TIMEOUT_SECS,
};
use credchain_protocol::{ConfigError, IssuanceRequest, LedgerConfig};

use crate::logging::LogFormat;

/// CredChain credential issuance node.
///
/// Issues academic credentials to the on-chain `CredentialRegistry`,
/// verifies them by identifier, and serves the same operations over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "credchain-node",
    about = "CredChain credential issuance node",
    version,
    propagate_version = true
)]
pub struct CredchainCli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "CREDCHAIN_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "CREDCHAIN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issue one credential and print its identifier.
    Issue(IssueArgs),
    /// Look up a credential by identifier. Read-only, needs no key.
    Verify(VerifyArgs),
    /// Report contract deployment, issuer authorization, and balance.
    Check(LedgerArgs),
    /// Generate a fresh issuer key pair.
    Keygen,
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

// ---------------------------------------------------------------------------
// Ledger arguments
// ---------------------------------------------------------------------------

/// Connection and identity settings shared by the state-changing commands.
#[derive(Args, Debug, Clone, Default)]
pub struct LedgerArgs {
    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = ENV_LEDGER_URL)]
    pub ledger_url: Option<String>,

    /// Address of the deployed `CredentialRegistry`.
    #[arg(long, env = ENV_CONTRACT_ADDRESS)]
    pub contract: Option<String>,

    /// Issuing account. Must be authorized on the registry.
    #[arg(long, env = ENV_ISSUER_ADDRESS)]
    pub issuer: Option<String>,

    /// Hex-encoded secp256k1 private key of the issuing account.
    ///
    /// Prefer the environment variable; flags end up in shell history.
    #[arg(long, env = ENV_ISSUER_PRIVATE_KEY, hide_env_values = true)]
    pub issuer_key: Option<String>,

    /// Content store endpoint, recorded for operators only.
    #[arg(long, env = ENV_CONTENT_STORE_URL)]
    pub content_store_url: Option<String>,

    /// Chain id. Queried from the node when omitted.
    #[arg(long, env = ENV_CHAIN_ID)]
    pub chain_id: Option<u64>,

    /// Seconds to wait for the receipt after broadcast.
    #[arg(long, env = ENV_CONFIRMATION_TIMEOUT_SECS)]
    pub confirmation_timeout_secs: Option<u64>,

    /// Milliseconds between receipt polls.
    #[arg(long, env = ENV_RECEIPT_POLL_INTERVAL_MS)]
    pub receipt_poll_interval_ms: Option<u64>,

    /// Per-request JSON-RPC timeout in seconds.
    #[arg(long, env = ENV_RPC_TIMEOUT_SECS)]
    pub rpc_timeout_secs: Option<u64>,
}

impl LedgerArgs {
    /// Validates the collected settings into a [`LedgerConfig`].
    ///
    /// Goes through `LedgerConfig::from_lookup` so flags and environment
    /// share one set of parsing rules and error messages.
    pub fn to_config(&self) -> Result<LedgerConfig, ConfigError> {
        let vars = self.as_vars();
        LedgerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn as_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        let mut put = |name: &'static str, value: Option<String>| {
            if let Some(v) = value {
                vars.insert(name, v);
            }
        };
        put(ENV_LEDGER_URL, self.ledger_url.clone());
        put(ENV_CONTRACT_ADDRESS, self.contract.clone());
        put(ENV_ISSUER_ADDRESS, self.issuer.clone());
        put(ENV_ISSUER_PRIVATE_KEY, self.issuer_key.clone());
        put(ENV_CONTENT_STORE_URL, self.content_store_url.clone());
        put(ENV_CHAIN_ID, self.chain_id.map(|v| v.to_string()));
        put(
            ENV_CONFIRMATION_TIMEOUT_SECS,
            self.confirmation_timeout_secs.map(|v| v.to_string()),
        );
        put(
            ENV_RECEIPT_POLL_INTERVAL_MS,
            self.receipt_poll_interval_ms.map(|v| v.to_string()),
        );
        put(ENV_RPC_TIMEOUT_SECS, self.rpc_timeout_secs.map(|v| v.to_string()));
        vars
    }
}

// ---------------------------------------------------------------------------
// Subcommand arguments
// ---------------------------------------------------------------------------

/// Arguments for the `issue` subcommand.
#[derive(Args, Debug)]
pub struct IssueArgs {
    #[arg(long)]
    pub student_id: String,

    #[arg(long)]
    pub student_name: String,

    #[arg(long)]
    pub degree: String,

    #[arg(long)]
    pub major: String,

    /// Content address (IPFS CID) of the already-uploaded credential document.
    #[arg(long, visible_alias = "ipfs-hash")]
    pub content_address: String,

    #[command(flatten)]
    pub ledger: LedgerArgs,
}

impl IssueArgs {
    pub fn request(&self) -> IssuanceRequest {
        IssuanceRequest {
            student_id: self.student_id.clone(),
            student_name: self.student_name.clone(),
            degree: self.degree.clone(),
            major: self.major.clone(),
            content_address: self.content_address.clone(),
        }
    }
}

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Credential identifier, 64 hex characters with or without `0x`.
    pub credential_id: String,

    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = ENV_LEDGER_URL)]
    pub ledger_url: String,

    /// Address of the deployed `CredentialRegistry`.
    #[arg(long, env = ENV_CONTRACT_ADDRESS)]
    pub contract: String,

    /// Per-request JSON-RPC timeout in seconds, at most one day.
    #[arg(
        long,
        env = ENV_RPC_TIMEOUT_SECS,
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=86_400)
    )]
    pub rpc_timeout_secs: u64,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address for the HTTP API, including `/metrics`.
    #[arg(long, env = "CREDCHAIN_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Serve against an in-process development ledger instead of a node.
    ///
    /// The registry is deployed at startup with the issuer as admin. State
    /// is lost on exit.
    #[arg(long)]
    pub devnet: bool,

    #[command(flatten)]
    pub ledger: LedgerArgs,
}
