// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CredChain Node
//!
//! Entry point for the `credchain-node` binary. Parses CLI arguments,
//! initializes logging, and runs one of the subcommands:
//!
//! - `issue`   — issue one credential and print the result as JSON
//! - `verify`  — read a credential back by identifier
//! - `check`   — diagnose the registry and the issuing account
//! - `keygen`  — generate a fresh issuer key pair
//! - `serve`   — serve the HTTP API, against a node or an in-process devnet
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use url::Url;

use credchain_contracts::{DevLedger, DevLedgerOptions};
use credchain_protocol::config::{parse_address, CREDENTIAL_ISSUED_SIGNATURE, ENV_CONTRACT_ADDRESS};
use credchain_protocol::crypto::IssuerKey;
use credchain_protocol::pipeline::read_credential;
use credchain_protocol::{
    CredentialId, CredentialPipeline, HttpLedgerClient, IssuerSecret, LedgerClient, LedgerConfig,
};

use cli::{Commands, CredchainCli};
use metrics::NodeMetrics;

/// Starting balance of the devnet issuer: 100 ether.
const DEVNET_FUNDING_ETHER: u64 = 100;

/// Placeholder endpoint recorded in the devnet configuration. Never dialled.
const DEVNET_URL: &str = "http://devnet.invalid";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CredchainCli::parse();

    let filter = cli
        .log_level
        .clone()
        .unwrap_or_else(|| format!("{},tower_http=debug", logging::DEFAULT_FILTER));
    logging::init_logging(&filter, cli.log_format).context("failed to initialize logging")?;

    match cli.command {
        Commands::Issue(args) => issue(args).await,
        Commands::Verify(args) => verify(args).await,
        Commands::Check(args) => check(args).await,
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Pipeline over a real node, configured from flags and environment.
fn http_pipeline(args: &cli::LedgerArgs) -> Result<CredentialPipeline<dyn LedgerClient>> {
    let config = args.to_config().context("invalid ledger configuration")?;
    config
        .verify_issuer_key()
        .context("issuer key does not match the issuer address")?;
    let client = HttpLedgerClient::from_config(&config)
        .with_context(|| format!("failed to create client for {}", config.ledger_url))?;
    let client: Arc<dyn LedgerClient> = Arc::new(client);
    Ok(CredentialPipeline::new(client, config))
}

async fn issue(args: cli::IssueArgs) -> Result<()> {
    let pipeline = http_pipeline(&args.ledger)?;
    let result = pipeline
        .issue_on_chain(&args.request())
        .await
        .context("credential issuance failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Verification needs only the endpoint and the registry address, so it
/// does not go through [`LedgerConfig`] and never asks for a key.
async fn verify(args: cli::VerifyArgs) -> Result<()> {
    let id = CredentialId::parse(&args.credential_id)
        .with_context(|| format!("invalid credential id {:?}", args.credential_id))?;
    let endpoint = Url::parse(&args.ledger_url)
        .with_context(|| format!("invalid ledger url {:?}", args.ledger_url))?;
    let contract = parse_address(ENV_CONTRACT_ADDRESS, &args.contract)?;
    let client = HttpLedgerClient::new(endpoint, Duration::from_secs(args.rpc_timeout_secs))
        .context("failed to create ledger client")?;

    let record = read_credential(&client, contract, &id)
        .await
        .with_context(|| format!("verification of {id} failed"))?;
    tracing::info!(credential_id = %id, is_valid = record.is_valid, "credential verified");
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn check(args: cli::LedgerArgs) -> Result<()> {
    let pipeline = http_pipeline(&args)?;
    let report = pipeline
        .check_contract()
        .await
        .context("contract check failed")?;
    println!("{report}");
    Ok(())
}

/// Prints a new key pair. The secret goes to stdout only, never to the log.
fn keygen() {
    let key = IssuerKey::generate();
    println!("ADMIN_WALLET_ADDRESS={}", key.address());
    println!("ADMIN_PRIVATE_KEY={}", key.secret_hex().as_str());
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

/// Starts the HTTP API and blocks until SIGINT or SIGTERM.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    tracing::info!(listen = %args.listen, devnet = args.devnet, "starting credchain-node");

    // --- Pipeline ---
    let (pipeline, ledger) = if args.devnet {
        (devnet_pipeline(&args.ledger)?, "devnet".to_string())
    } else {
        let pipeline = http_pipeline(&args.ledger)?;
        let ledger = pipeline.config().ledger_url.to_string();
        (pipeline, ledger)
    };

    // --- Startup diagnostics ---
    // A failing check is logged, not fatal: the node may come up before the
    // ledger does.
    match pipeline.check_contract().await {
        Ok(report) if report.issuer_authorized && !report.low_balance => {
            tracing::info!(
                contract = %report.contract,
                issuer = %report.issuer,
                "registry reachable, issuer authorized"
            );
        }
        Ok(report) => tracing::warn!("registry check found problems:\n{report}"),
        Err(e) => tracing::warn!(error = %e, "registry check failed"),
    }

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to register prometheus metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger,
        pipeline,
        metrics: node_metrics,
    };

    // --- API server ---
    let router = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind API listener on {}", args.listen))?;
    tracing::info!("API server listening on {}", args.listen);

    // --- Serve ---
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("credchain-node stopped");
    Ok(())
}

/// Pipeline over an in-process ledger whose registry admin is the issuer.
///
/// Uses `--issuer-key` when given, otherwise a throwaway key. The issuer is
/// funded with [`DEVNET_FUNDING_ETHER`].
fn devnet_pipeline(args: &cli::LedgerArgs) -> Result<CredentialPipeline<dyn LedgerClient>> {
    let key = match &args.issuer_key {
        Some(raw) => IssuerKey::from_hex(raw).context("invalid devnet issuer key")?,
        None => {
            tracing::info!("no issuer key given, generating a throwaway devnet key");
            IssuerKey::generate()
        }
    };

    let ledger = Arc::new(DevLedger::new(key.address(), DevLedgerOptions::default()));
    let ether = U256::from(10u64).pow(U256::from(18u64));
    ledger.fund(key.address(), ether * U256::from(DEVNET_FUNDING_ETHER));

    let config = LedgerConfig::new(
        DEVNET_URL,
        &ledger.contract_address().to_string(),
        &key.address().to_string(),
        IssuerSecret::new(key.secret_hex().to_string()),
    )
    .context("invalid devnet configuration")?
    .with_chain_id(ledger.options().chain_id)
    .with_receipt_poll_interval(Duration::from_millis(50));

    tracing::info!(
        issuer = %key.address(),
        contract = %ledger.contract_address(),
        chain_id = ledger.options().chain_id,
        "devnet ledger ready"
    );

    let client: Arc<dyn LedgerClient> = ledger;
    Ok(CredentialPipeline::new(client, config))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_version() {
    println!("credchain-node {}", env!("CARGO_PKG_VERSION"));
    println!("event          {}", CREDENTIAL_ISSUED_SIGNATURE);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}
