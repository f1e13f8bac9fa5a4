//! # REST API
//!
//! Builds the axum router that exposes the node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                          |
//! |--------|-----------------------------|--------------------------------------|
//! | GET    | `/health`                   | Liveness check                       |
//! | GET    | `/status`                   | Registry and issuer diagnostics      |
//! | POST   | `/credentials/issue`        | Issue a credential on the ledger     |
//! | GET    | `/verify/:credential_id`    | Read a credential back by identifier |
//! | GET    | `/metrics`                  | Prometheus text exposition           |
//!
//! Request and response bodies use the camelCase field names the existing
//! web frontend already sends (`studentId`, `ipfsHash`, ...).

use std::time::Instant;

use axum::{
    extract::{FromRef, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use credchain_protocol::{
    CredentialId, CredentialPipeline, IssuanceRequest, LedgerClient, PipelineError,
};

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: the pipeline holds its client behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// What the node is issuing against: `devnet` or the node endpoint.
    pub ledger: String,
    /// Issuance and verification against the configured registry.
    pub pipeline: CredentialPipeline<dyn LedgerClient>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/credentials/issue", post(issue_handler))
        .route("/verify/:credential_id", get(verify_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /credentials/issue`.
///
/// Every field defaults to empty so that a missing field is reported by name
/// in a 400 rather than as a generic deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueBody {
    pub student_id: String,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    pub ipfs_hash: String,
}

impl From<IssueBody> for IssuanceRequest {
    fn from(body: IssueBody) -> Self {
        IssuanceRequest {
            student_id: body.student_id,
            student_name: body.student_name,
            degree: body.degree,
            major: body.major,
            content_address: body.ipfs_hash,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub credential_id: String,
    pub student_id: String,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    pub ipfs_hash: String,
    pub transaction_hash: String,
    pub block_number: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub success: bool,
    pub request_id: String,
    pub credential: IssuedCredential,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub credential_id: String,
    pub student_name: String,
    pub degree: String,
    pub major: String,
    /// RFC 3339, UTC.
    pub issue_date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub credential: CredentialView,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable error label, e.g. `authorization` or `not_found`.
    pub kind: String,
    /// Present on verification failures, always `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl ErrorResponse {
    fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.to_string(),
            valid: None,
        }
    }

    fn invalid(mut self) -> Self {
        self.valid = Some(false);
        self
    }

    fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// HTTP status for each pipeline failure.
///
/// Problems the caller can fix are 4xx. Problems with the node, the ledger,
/// or the issuing account are 5xx, with 502 for anything upstream.
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Authorization { .. } => StatusCode::FORBIDDEN,
        PipelineError::GasEstimation(_) | PipelineError::TransactionReverted { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::InsufficientFunds { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Network(_) | PipelineError::IdentifierExtraction(_) => {
            StatusCode::BAD_GATEWAY
        }
        PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn camel_case(field: &str) -> &str {
    match field {
        "student_id" => "studentId",
        "student_name" => "studentName",
        "content_address" => "ipfsHash",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// Does not touch the ledger; `/status` does.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": state.version,
            "ledger": state.ledger,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET /status` — contract deployment, issuer authorization, and balance.
async fn status_handler(State(state): State<AppState>) -> Response {
    match state.pipeline.check_contract().await {
        Ok(report) => {
            if report.low_balance {
                warn!(issuer = %report.issuer, "issuer balance is low");
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => ErrorResponse::new(e.kind(), e.to_string()).with_status(status_for(&e)),
    }
}

/// `POST /credentials/issue` — records one credential and waits for the
/// receipt.
///
/// The document must already be in the content store; the body carries its
/// address as `ipfsHash`.
async fn issue_handler(State(state): State<AppState>, Json(body): Json<IssueBody>) -> Response {
    let request = IssuanceRequest::from(body);
    let missing = request.missing_fields();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.into_iter().map(camel_case).collect();
        return ErrorResponse::new(
            "invalid_request",
            format!("missing required fields: {}", names.join(", ")),
        )
        .with_status(StatusCode::BAD_REQUEST);
    }

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("http_issue", %request_id);
    let started = Instant::now();
    let result = state
        .pipeline
        .issue_on_chain(&request)
        .instrument(span)
        .await;
    state
        .metrics
        .record_issuance(&result, started.elapsed().as_secs_f64());

    match result {
        Ok(issued) => {
            info!(%request_id, credential_id = %issued.credential_id, "issue request served");
            let resp = IssueResponse {
                success: true,
                request_id: request_id.to_string(),
                credential: IssuedCredential {
                    credential_id: issued.credential_id.to_string(),
                    student_id: request.student_id,
                    student_name: request.student_name,
                    degree: request.degree,
                    major: request.major,
                    ipfs_hash: request.content_address,
                    transaction_hash: issued.transaction_hash.to_string(),
                    block_number: issued.block_number,
                },
                message: "Credential issued successfully".into(),
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => {
            warn!(%request_id, kind = e.kind(), error = %e, "issue request failed");
            ErrorResponse::new(e.kind(), e.to_string()).with_status(status_for(&e))
        }
    }
}

/// `GET /verify/:credential_id` — the registry's record for an identifier.
///
/// `valid` is the ledger's validity flag. Returns 404 with `valid: false`
/// when the registry has no such credential.
async fn verify_handler(
    Path(raw_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let id = match CredentialId::parse(&raw_id) {
        Ok(id) => id,
        Err(e) => {
            return ErrorResponse::new("invalid_request", format!("bad credential id: {e}"))
                .invalid()
                .with_status(StatusCode::BAD_REQUEST);
        }
    };

    let result = state.pipeline.verify_on_chain(&id).await;
    state.metrics.record_verification(&result);

    match result {
        Ok(record) => {
            let resp = VerifyResponse {
                valid: record.is_valid,
                credential: CredentialView {
                    credential_id: record.credential_id.to_string(),
                    student_name: record.student_name,
                    degree: record.degree,
                    major: record.major,
                    issue_date: record.issue_date.to_rfc3339(),
                },
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => ErrorResponse::new(e.kind(), e.to_string())
            .invalid()
            .with_status(status_for(&e)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
