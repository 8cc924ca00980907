// crates/triage-gate-http/src/routes/uploads.rs
// ============================================================================
// Module: Document Upload Route
// Description: Multipart upload into the grounding store.
// Purpose: Let operators feed context documents to the analyzer.
// Dependencies: axum, triage-gate-core
// ============================================================================

//! ## Overview
//! [`upload`] ingests one multipart file field into the grounding store. The
//! `EmbeddingStore` contract exposes no existence probe, so duplicate
//! detection is maintained at this edge via a process-local
//! `(filename, content_hash)` set mirroring the store's own dedup key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Multipart;
use axum::extract::State;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /fileapi/upload` (§6.1).
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the multipart payload carries no file
/// field, [`ApiError::Conflict`] if the same filename/content was already
/// ingested, or [`ApiError::Grounding`] if ingest fails.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<serde_json::Value>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
        .ok_or_else(|| ApiError::Validation("multipart payload carries no file field".to_string()))?;

    let original_filename = field.file_name().unwrap_or("upload").to_string();
    let bytes = field.bytes().await.map_err(|err| ApiError::Validation(err.to_string()))?;

    if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > state.max_content_length {
        return Err(ApiError::Validation("uploaded document exceeds the configured size limit".to_string()));
    }

    let content_hash = format!("{:x}", md5::compute(&bytes));
    let key = (original_filename.clone(), content_hash);
    {
        let mut seen = state.seen_uploads.lock().map_err(|_| ApiError::Internal("poisoned upload cache".to_string()))?;
        if !seen.insert(key) {
            return Err(ApiError::Conflict("document already ingested".to_string()));
        }
    }

    let document_id = state.grounding.ingest(&original_filename, &bytes).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "document_id": document_id.as_str(),
        "original_filename": original_filename,
        "content_length": bytes.len(),
    })))
}
