//! # Prometheus Metrics
//!
//! Counts issuance and verification attempts by outcome and times every
//! issuance end to end. Scraped by Prometheus at `/metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use credchain_protocol::PipelineError;

/// Outcome label for a successful call.
pub const OUTCOME_SUCCESS: &str = "success";

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Issuance attempts, labelled `outcome` (`success` or an error kind).
    pub issuance_total: IntCounterVec,
    /// Verification attempts, labelled `outcome`.
    pub verification_total: IntCounterVec,
    /// Wall time of `issue_on_chain`, including the confirmation wait.
    pub issuance_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("credchain".into()), None)?;

        let issuance_total = IntCounterVec::new(
            Opts::new("issuance_total", "Credential issuance attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(issuance_total.clone()))?;

        let verification_total = IntCounterVec::new(
            Opts::new(
                "verification_total",
                "Credential verification attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(verification_total.clone()))?;

        // Confirmation dominates; buckets span one block to the timeout.
        let issuance_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "issuance_latency_seconds",
                "End-to-end issuance latency in seconds, broadcast to receipt included",
            )
            .buckets(vec![0.05, 0.25, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(issuance_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            issuance_total,
            verification_total,
            issuance_latency_seconds,
        })
    }

    pub fn record_issuance<T>(&self, result: &Result<T, PipelineError>, seconds: f64) {
        self.issuance_total
            .with_label_values(&[outcome(result)])
            .inc();
        self.issuance_latency_seconds.observe(seconds);
    }

    pub fn record_verification<T>(&self, result: &Result<T, PipelineError>) {
        self.verification_total
            .with_label_values(&[outcome(result)])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn outcome<T>(result: &Result<T, PipelineError>) -> &'static str {
    match result {
        Ok(_) => OUTCOME_SUCCESS,
        Err(e) => e.kind(),
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
