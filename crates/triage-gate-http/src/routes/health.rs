// crates/triage-gate-http/src/routes/health.rs
// ============================================================================
// Module: Health Route
// Description: Liveness probe.
// Purpose: Let orchestration layers (container platforms, load balancers) poll readiness.
// Dependencies: axum
// ============================================================================

//! ## Overview
//! No dependency checks: a process that can answer this handler at all has a
//! running executor, which is the only thing worth reporting here.

use axum::Json;

/// `GET /healthz` (§6.1).
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "success" }))
}
