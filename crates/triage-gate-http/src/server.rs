// crates/triage-gate-http/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Builds the axum router and serves it on a bound TCP listener.
// Purpose: The one entry point the CLI's `serve` subcommand calls.
// Dependencies: axum, tokio
// ============================================================================

//! ## Overview
//! [`serve`] wires every route in §6.1 onto one [`axum::Router`] and blocks
//! serving it, the same `TcpListener::bind` + `axum::serve` shape the
//! underlying MCP transport uses for its own HTTP/SSE listeners.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;

use crate::routes::analyses;
use crate::routes::configs;
use crate::routes::health;
use crate::routes::trello;
use crate::routes::uploads;
use crate::state::AppState;

/// Failures from binding or serving the HTTP edge.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The bind address could not be parsed or bound.
    #[error("http bind failed: {0}")]
    Bind(String),
    /// The server loop returned an error.
    #[error("http server failed: {0}")]
    Serve(String),
}

/// Builds the full router over `state`.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/trello/board/{board_id}/list/{list_id}/analyze", post(trello::analyze_list))
        .route("/api/trello/card/{card_id}/add-label", post(trello::add_label))
        .route("/api/trello/card/{card_id}/add-comment", post(trello::add_comment))
        .route("/api/trello/card/{card_id}/move", put(trello::move_card))
        .route("/api/trello/card/{card_id}/analyze", post(trello::analyze_card))
        .route(
            "/api/trello/config-board-subscription",
            post(configs::create).get(configs::list),
        )
        .route("/api/trello/config-board-subscription/{id}", put(configs::update))
        .route("/api/trello/config-board-subscription/{id}/target-list", post(configs::set_target_list))
        .route("/api/analyses", get(analyses::list_analyses))
        .route("/api/tickets", get(analyses::list_tickets))
        .route("/api/tickets/{external_id}/reanalyze", post(analyses::reanalyze))
        .route("/api/tickets/{external_id}/analysis/history", get(analyses::history))
        .route("/api/analysis/statistics", get(analyses::statistics))
        .route("/api/analysis/cache/clear", post(analyses::clear_cache))
        .route("/api/analysis/cache/status", get(analyses::cache_status))
        .route("/fileapi/upload", post(uploads::upload))
        .with_state(state)
}

/// Binds `bind_addr` and serves every §6.1 route until the process is killed.
///
/// # Errors
///
/// Returns [`ServerError`] if the address cannot be bound or the server loop
/// fails.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|err| ServerError::Bind(err.to_string()))?;
    axum::serve(listener, router(state)).await.map_err(|err| ServerError::Serve(err.to_string()))
}
