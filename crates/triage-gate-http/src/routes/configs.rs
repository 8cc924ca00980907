// crates/triage-gate-http/src/routes/configs.rs
// ============================================================================
// Module: Config Board Subscription Routes
// Description: CRUD over the per-board-watch Config row.
// Purpose: Let operators register and retarget the lists the scheduler watches.
// Dependencies: axum, triage-gate-core
// ============================================================================

//! ## Overview
//! A "config board subscription" is one [`triage_gate_core::Config`] row:
//! the (board, list) pair the scheduler watches, and the optional target
//! list a successfully analyzed card is moved to.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use serde::Deserialize;
use serde::Serialize;
use triage_gate_core::Config;
use triage_gate_core::ConfigData;
use triage_gate_core::ConfigId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for [`create`] and the body fields accepted by [`update`].
#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    /// Provider credential bound to this watch.
    token: String,
    /// Provider board identifier.
    board_id: String,
    /// Human-readable board name.
    board_name: String,
    /// Provider list identifier being watched.
    list_id: String,
    /// Human-readable list name.
    list_name: String,
    /// List a successfully analyzed card is moved to, if configured.
    #[serde(default)]
    target_list_id: Option<String>,
    /// Human-readable name of `target_list_id`.
    #[serde(default)]
    target_list_name: Option<String>,
}

impl From<ConfigRequest> for ConfigData {
    fn from(request: ConfigRequest) -> Self {
        Self {
            token: request.token,
            board_id: request.board_id,
            board_name: request.board_name,
            list_id: request.list_id,
            list_name: request.list_name,
            target_list_id: request.target_list_id,
            target_list_name: request.target_list_name,
        }
    }
}

/// Response envelope wrapping one [`Config`] row.
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    /// Always `"success"`.
    status: &'static str,
    /// The config row.
    config: Config,
}

/// `POST /api/trello/config-board-subscription` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError`] if the row cannot be created.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<ConfigRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config = state.persistence.create_config(body.into()).await?;
    Ok(Json(ConfigResponse { status: "success", config }))
}

/// `GET /api/trello/config-board-subscription` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError`] if the listing fails.
pub async fn list(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let configs = state.persistence.list_configs().await?;
    Ok(Json(serde_json::json!({ "status": "success", "configs": configs })))
}

/// `PUT /api/trello/config-board-subscription/{id}` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if `id` is not a valid identifier, or
/// [`ApiError::NotFound`] if no row exists under it.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<ConfigRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config_id = ConfigId::from_raw(id).ok_or_else(|| ApiError::Validation("id must be non-zero".to_string()))?;
    let config = state.persistence.update_config(config_id, body.into()).await?;
    Ok(Json(ConfigResponse { status: "success", config }))
}

/// Request body for [`set_target_list`].
#[derive(Debug, Deserialize)]
pub struct TargetListRequest {
    /// New target list identifier.
    target_list_id: String,
    /// New target list name.
    target_list_name: String,
}

/// `POST /api/trello/config-board-subscription/{id}/target-list` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if `id` is not a valid identifier, or
/// [`ApiError::NotFound`] if no row exists under it.
pub async fn set_target_list(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<TargetListRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config_id = ConfigId::from_raw(id).ok_or_else(|| ApiError::Validation("id must be non-zero".to_string()))?;
    let existing = state
        .persistence
        .get_config(config_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("config not found".to_string()))?;
    let mut data = existing.data;
    data.target_list_id = Some(body.target_list_id);
    data.target_list_name = Some(body.target_list_name);
    let config = state.persistence.update_config(config_id, data).await?;
    Ok(Json(ConfigResponse { status: "success", config }))
}
