// crates/triage-gate-http/src/routes/analyses.rs
// ============================================================================
// Module: Analysis Listing And Reporting Routes
// Description: Analyses/tickets listings, reanalyze, history, statistics, cache.
// Purpose: Expose the read side of the criticality model over HTTP.
// Dependencies: axum, triage-gate-core, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! `analyses` and `tickets` are read models over [`triage_gate_core::AnalysisSession`]
//! and [`triage_gate_core::Ticket`]: neither carries a denormalized count or
//! join column, so this module folds `all_history`/`all_sessions`/`all_tickets`
//! into the shapes §6.1 describes, then applies the shared pagination/filter
//! contract from [`crate::pagination`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use serde::Deserialize;
use serde::Serialize;
use triage_gate_core::AnalysisHistory;
use triage_gate_core::ExternalCardId;
use triage_gate_core::SessionId;
use triage_gate_core::TicketId;
use triage_gate_core::core::time::to_rfc3339;

use crate::error::ApiError;
use crate::pagination::PageQuery;
use crate::pagination::paginate;
use crate::state::AppState;

// ============================================================================
// SECTION: Analyses Listing
// ============================================================================

/// One row of `GET /api/analyses` (§6.1).
#[derive(Debug, Clone, Serialize)]
struct AnalysisSummaryRow {
    /// Session identifier.
    id: u64,
    /// Human-readable session reference.
    reference: String,
    /// Whether this session was a reanalysis pass.
    reanalyse: bool,
    /// Creation timestamp, RFC 3339.
    created_at: String,
    /// Distinct tickets evaluated in this session.
    tickets_count: u64,
}

/// `GET /api/analyses` (§6.1): paginated, filterable by `createdAt`/`tickets_count`.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] on a malformed filter or page parameter.
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = query.resolve_page()?;
    let filters = query.parse_filters()?;

    let sessions = state.persistence.all_sessions().await?;
    let history = state.persistence.all_history().await?;

    let mut counts: HashMap<SessionId, u64> = HashMap::new();
    for row in &history {
        *counts.entry(row.session_id).or_insert(0) += 1;
    }

    let mut rows: Vec<AnalysisSummaryRow> = sessions
        .iter()
        .map(|session| AnalysisSummaryRow {
            id: session.id.get(),
            reference: session.reference.as_str().to_string(),
            reanalyse: session.reanalyse,
            created_at: to_rfc3339(session.created_at).unwrap_or_default(),
            tickets_count: counts.get(&session.id).copied().unwrap_or(0),
        })
        .collect();

    for filter in &filters {
        rows.retain(|row| match filter.field.as_str() {
            "tickets_count" => compare_u64(row.tickets_count, &filter.op, &filter.value),
            "createdAt" => compare_rfc3339(&row.created_at, &filter.op, &filter.value),
            other => {
                let _ = other;
                true
            }
        });
    }

    if let Some(order_by) = &query.order_by {
        match order_by.as_str() {
            "tickets_count" => rows.sort_by_key(|row| row.tickets_count),
            "createdAt" => rows.sort_by(|left, right| left.created_at.cmp(&right.created_at)),
            _ => {}
        }
        if query.descending() {
            rows.reverse();
        }
    }

    let total = rows.len();
    let rows = paginate(rows, page);
    Ok(Json(serde_json::json!({ "status": "success", "total": total, "analyses": rows })))
}

/// Compares `value` against a numeric filter operand.
fn compare_u64(value: u64, op: &str, operand: &str) -> bool {
    let Ok(operand) = operand.parse::<u64>() else { return false };
    match op {
        "eq" => value == operand,
        "gt" => value > operand,
        "gte" => value >= operand,
        "lt" => value < operand,
        "lte" => value <= operand,
        _ => false,
    }
}

/// Compares `value` (RFC 3339) against a filter operand (RFC 3339).
fn compare_rfc3339(value: &str, op: &str, operand: &str) -> bool {
    match op {
        "eq" => value == operand,
        "gt" => value > operand,
        "gte" => value >= operand,
        "lt" => value < operand,
        "lte" => value <= operand,
        _ => false,
    }
}

// ============================================================================
// SECTION: Tickets Listing
// ============================================================================

/// Query parameters accepted by [`list_tickets`], layered on [`PageQuery`].
#[derive(Debug, Deserialize)]
pub struct TicketsQuery {
    /// Session identifier to scope the listing to.
    analyse_id: u64,
}

/// One row of `GET /api/tickets` (§6.1).
#[derive(Debug, Clone, Serialize)]
struct TicketRow {
    /// Provider card identifier.
    external_id: String,
    /// Card title.
    name: String,
    /// Criticality evaluated in the named analysis session.
    criticality_level: String,
}

/// `GET /api/tickets?analyse_id=...` (§6.1): paginated, filterable by
/// `criticality_level:eq:{high|medium|low}` and `name:contains:{s}`.
///
/// Associates tickets to an analysis session via the [`AnalysisHistory`] rows
/// that session produced, since [`triage_gate_core::Ticket`] itself carries
/// no session reference (a ticket can be touched by many sessions over its
/// lifetime).
///
/// # Errors
///
/// Returns [`ApiError::Validation`] on a malformed filter or page parameter.
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketsQuery>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = page_query.resolve_page()?;
    let filters = page_query.parse_filters()?;

    let session_id =
        SessionId::from_raw(query.analyse_id).ok_or_else(|| ApiError::Validation("analyse_id must be non-zero".to_string()))?;

    let history = state.persistence.all_history().await?;
    let tickets = state.persistence.all_tickets().await?;
    let tickets_by_id: HashMap<TicketId, _> = tickets.iter().map(|ticket| (ticket.id, ticket)).collect();

    let session_history: Vec<&AnalysisHistory> = history.iter().filter(|row| row.session_id == session_id).collect();

    let mut rows: Vec<TicketRow> = session_history
        .into_iter()
        .filter_map(|row| {
            let ticket = tickets_by_id.get(&row.ticket_id)?;
            Some(TicketRow {
                external_id: ticket.external_id.as_str().to_string(),
                name: ticket.metadata.name.clone(),
                criticality_level: row.criticality.as_str().to_ascii_uppercase(),
            })
        })
        .collect();

    for filter in &filters {
        rows.retain(|row| match filter.field.as_str() {
            "criticality_level" if filter.op == "eq" => {
                row.criticality_level.eq_ignore_ascii_case(&filter.value)
            }
            "name" if filter.op == "contains" => {
                row.name.to_ascii_lowercase().contains(&filter.value.to_ascii_lowercase())
            }
            _ => true,
        });
    }

    let total = rows.len();
    let rows = paginate(rows, page);
    Ok(Json(serde_json::json!({ "status": "success", "total": total, "tickets": rows })))
}

// ============================================================================
// SECTION: Reanalysis And History
// ============================================================================

/// `POST /api/tickets/{externalId}/reanalyze` (§6.1, §4.6).
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no ticket is tracked under `external_id`.
pub async fn reanalyze(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.reanalysis.reanalyze(&ExternalCardId::new(external_id)).await?;
    Ok(Json(serde_json::json!({ "status": "success", "result": result })))
}

/// `GET /api/tickets/{externalId}/analysis/history` (§6.1): newest first.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no ticket is tracked under `external_id`.
pub async fn history(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = state
        .persistence
        .get_ticket_by_external_id(&ExternalCardId::new(external_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))?;
    let mut rows = state.persistence.history_for_ticket(ticket.id).await?;
    rows.reverse();
    Ok(Json(serde_json::json!({ "status": "success", "history": rows })))
}

// ============================================================================
// SECTION: Statistics And Cache
// ============================================================================

/// `GET /api/analysis/statistics` (§6.1, §4.7).
///
/// # Errors
///
/// Returns [`ApiError`] if the underlying reads fail.
pub async fn statistics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.statistics.compute().await?;
    Ok(Json(serde_json::json!({ "status": "success", "statistics": stats })))
}

/// Request body for [`clear_cache`].
#[derive(Debug, Deserialize)]
pub struct ClearCacheRequest {
    /// External card id to clear; clears every ticket when absent.
    #[serde(default)]
    ticket_id: Option<String>,
}

/// `POST /api/analysis/cache/clear` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if `ticket_id` is set but no ticket is
/// tracked under it.
pub async fn clear_cache(
    State(state): State<AppState>,
    Json(body): Json<ClearCacheRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = match body.ticket_id {
        Some(external_id) => {
            let ticket = state
                .persistence
                .get_ticket_by_external_id(&ExternalCardId::new(external_id))
                .await?
                .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))?;
            Some(ticket.id)
        }
        None => None,
    };
    let cleared = state.persistence.clear_cache(target).await?;
    Ok(Json(serde_json::json!({ "status": "success", "cleared": cleared })))
}

/// `GET /api/analysis/cache/status` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError`] if the underlying read fails.
pub async fn cache_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let tickets = state.persistence.all_tickets().await?;
    let cached = tickets.iter().filter(|ticket| ticket.metadata.analysis_result.is_some()).count();
    Ok(Json(serde_json::json!({
        "status": "success",
        "total_tickets": tickets.len(),
        "cached_tickets": cached,
    })))
}
