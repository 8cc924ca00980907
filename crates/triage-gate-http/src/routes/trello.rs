// crates/triage-gate-http/src/routes/trello.rs
// ============================================================================
// Module: Board Action Routes
// Description: List analyze, single-card label/comment/move/analyze endpoints.
// Purpose: Expose the orchestrator pipeline and the board client over HTTP.
// Dependencies: axum, triage-gate-core, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! [`analyze_list`] runs a full §4.1 pass over one board list. The remaining
//! handlers in this module act on a single card directly through the board
//! client, bypassing the orchestrator and persistence entirely -- they exist
//! for operators driving a card by hand, not for the automated pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use serde::Deserialize;
use serde::Serialize;
use triage_gate_core::Card;
use triage_gate_core::CardContext;
use triage_gate_core::Criticality;
use triage_gate_orchestrator::AnalyzeListSummary;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters accepted by [`analyze_list`], since the board/list path
/// only carries provider identifiers, not the human-readable names the
/// orchestrator records on a ticket.
#[derive(Debug, Deserialize)]
pub struct AnalyzeListQuery {
    /// Human-readable board name; defaults to the board id when absent.
    #[serde(default)]
    board_name: Option<String>,
    /// Human-readable list name; defaults to the list id when absent.
    #[serde(default)]
    list_name: Option<String>,
}

/// Envelope wrapping [`AnalyzeListSummary`] in the shared response shape.
#[derive(Debug, Serialize)]
pub struct AnalyzeListResponse {
    /// Always `"success"`.
    status: &'static str,
    /// Run summary.
    #[serde(flatten)]
    summary: AnalyzeListSummary,
}

/// `POST /api/trello/board/{boardId}/list/{listId}/analyze` (§6.1, §4.1).
///
/// # Errors
///
/// Returns [`ApiError`] if no matching subscription config is found, the
/// board fetch fails, or the commit fails.
pub async fn analyze_list(
    State(state): State<AppState>,
    Path((board_id, list_id)): Path<(String, String)>,
    Query(query): Query<AnalyzeListQuery>,
) -> Result<Json<AnalyzeListResponse>, ApiError> {
    let _permit = state
        .analyze_inflight
        .try_acquire()
        .map_err(|_| ApiError::Validation("too many concurrent analyze requests".to_string()))?;

    let configs = state.persistence.list_configs().await?;
    let matching = configs.into_iter().find(|config| config.data.board_id == board_id && config.data.list_id == list_id);

    let board_name = query.board_name.unwrap_or_else(|| board_id.clone());
    let list_name = query.list_name.unwrap_or_else(|| list_id.clone());

    let (config_snapshot, target_list) = match &matching {
        Some(config) => {
            let snapshot = serde_json::to_value(&config.data).map_err(|err| ApiError::Internal(err.to_string()))?;
            let target = config
                .data
                .target_list_id
                .clone()
                .zip(config.data.target_list_name.clone());
            (snapshot, target)
        }
        None => (serde_json::json!({ "board_id": board_id, "list_id": list_id }), None),
    };

    let (session, scope) = state
        .persistence
        .create_session(false, None, &state.platform)
        .await?;

    let summary = state
        .orchestrator
        .analyze_list(
            &board_id,
            &list_id,
            &board_name,
            &list_name,
            Some(scope.id),
            Some(session.id),
            config_snapshot,
            target_list,
        )
        .await
        .map_err(ApiError::BoardApi)?;

    Ok(Json(AnalyzeListResponse { status: "success", summary }))
}

/// Request body for [`add_label`].
#[derive(Debug, Deserialize)]
pub struct AddLabelRequest {
    /// Board the card lives on.
    board_id: String,
    /// Priority level to apply.
    level: Criticality,
}

/// `POST /api/trello/card/{cardId}/add-label` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::BoardApi`] if the board provider call fails.
pub async fn add_label(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    Json(body): Json<AddLabelRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.board_client.add_label(&card_id, &body.board_id, body.level).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// Request body for [`add_comment`].
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    /// Comment text.
    text: String,
}

/// `POST /api/trello/card/{cardId}/add-comment` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::BoardApi`] if the board provider call fails.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    Json(body): Json<AddCommentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.board_client.add_comment(&card_id, &body.text).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// Request body for [`move_card`].
#[derive(Debug, Deserialize)]
pub struct MoveCardRequest {
    /// Destination list id.
    new_list_id: String,
}

/// `PUT /api/trello/card/{cardId}/move` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::BoardApi`] if the board provider call fails.
pub async fn move_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    Json(body): Json<MoveCardRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.board_client.move_card(&card_id, &body.new_list_id).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// Request body for the ad-hoc single-card analyze endpoint.
///
/// # Invariants
/// - There is no `get_card` operation on [`triage_gate_core::BoardClient`],
///   so the caller supplies the full card context directly; the board is
///   never refetched and nothing is persisted (§6.1).
#[derive(Debug, Deserialize)]
pub struct AnalyzeCardRequest {
    /// Full card payload to evaluate.
    card: Card,
    /// Board identifier the card is presented as belonging to.
    board_id: String,
    /// Board name the card is presented as belonging to.
    board_name: String,
    /// List identifier the card is presented as belonging to.
    list_id: String,
    /// List name the card is presented as belonging to.
    list_name: String,
}

/// `POST /api/trello/card/{cardId}/analyze` (§6.1): ad-hoc, no persistence.
///
/// # Errors
///
/// Returns [`ApiError::Analyzer`] if the analyzer cannot be reached.
pub async fn analyze_card(
    State(state): State<AppState>,
    Path(_card_id): Path<String>,
    Json(body): Json<AnalyzeCardRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let context = CardContext {
        card: body.card,
        board_id: body.board_id,
        board_name: body.board_name,
        list_id: body.list_id,
        list_name: body.list_name,
    };
    let outcome = state.analyzer.analyze_one(&context).await?;
    Ok(Json(serde_json::json!({ "status": "success", "result": outcome })))
}
