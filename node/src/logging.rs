//! # Structured Logging
//!
//! One `tracing` subscriber for the whole process, writing to stderr. Stdout
//! belongs to command output: `issue` and `verify` print JSON there and
//! scripts pipe it onward.
//!
//! The filter comes from `RUST_LOG` when set, then `--log-level`, then
//! [`DEFAULT_FILTER`]. Directives use `EnvFilter` syntax:
//!
//! ```text
//! RUST_LOG=credchain_protocol=debug,tower_http=debug
//! ```

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_FILTER: &str =
    "credchain_node=info,credchain_protocol=info,credchain_contracts=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-field lines with source locations. For terminals.
    Pretty,
    /// One JSON object per line. For log shippers.
    Json,
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed, which only happens when this
/// is called twice.
pub fn init_logging(
    fallback_filter: &str,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
