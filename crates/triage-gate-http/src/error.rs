// crates/triage-gate-http/src/error.rs
// ============================================================================
// Module: API Error
// Description: Maps every collaborator error onto the {status, message} envelope.
// Purpose: One place that decides HTTP status codes for every failure mode.
// Dependencies: axum, triage-gate-core, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! Every handler returns `Result<T, ApiError>`. [`ApiError`] carries the
//! classification from §7 (validation, not-found, board/analyzer/store
//! failures, internal) and renders the shared `{status:"error", message}`
//! response body on `IntoResponse`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use triage_gate_core::AnalyzerError;
use triage_gate_core::BoardClientError;
use triage_gate_core::GroundingStoreError;
use triage_gate_core::StoreError;
use triage_gate_orchestrator::ReanalysisError;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Failures surfaced by an HTTP handler (§7).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body or path/query parameters were malformed.
    #[error("{0}")]
    Validation(String),
    /// The named resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The board provider could not be reached or returned a hard failure.
    #[error("{0}")]
    BoardApi(String),
    /// The analyzer could not be reached or configured.
    #[error("{0}")]
    Analyzer(String),
    /// The persistence layer failed.
    #[error("{0}")]
    Store(String),
    /// The grounding store failed.
    #[error("{0}")]
    Grounding(String),
    /// The uploaded document duplicates one already ingested.
    #[error("{0}")]
    Conflict(String),
    /// Any other failure with no dedicated classification.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Maps this error onto its HTTP status code (§7).
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BoardApi(_) | Self::Analyzer(_) | Self::Store(_) | Self::Grounding(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(detail) => Self::NotFound(detail),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<BoardClientError> for ApiError {
    fn from(err: BoardClientError) -> Self {
        Self::BoardApi(err.to_string())
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        Self::Analyzer(err.to_string())
    }
}

impl From<GroundingStoreError> for ApiError {
    fn from(err: GroundingStoreError) -> Self {
        Self::Grounding(err.to_string())
    }
}

impl From<ReanalysisError> for ApiError {
    fn from(err: ReanalysisError) -> Self {
        match err {
            ReanalysisError::TicketNotFound => Self::NotFound("ticket not found".to_string()),
            ReanalysisError::Analyzer(err) => Self::Analyzer(err.to_string()),
            ReanalysisError::Store(err) => Self::Store(err.to_string()),
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Always `"error"`.
    status: &'static str,
    /// Human-readable error detail.
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody { status: "error", message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
