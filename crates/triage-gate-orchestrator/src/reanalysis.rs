// crates/triage-gate-orchestrator/src/reanalysis.rs
// ============================================================================
// Module: Reanalysis Service
// Description: Re-evaluates one already-tracked ticket outside a list run.
// Purpose: Let an operator force a fresh evaluation without refetching a board.
// Dependencies: triage-gate-core
// ============================================================================

//! ## Overview
//! [`ReanalysisService::reanalyze`] never touches the board: it is a pure
//! re-evaluation against the ticket's last-known metadata, recorded under a
//! fresh session with `reanalyse = true` (§4.6).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use triage_gate_core::Analyzer;
use triage_gate_core::Card;
use triage_gate_core::CardContext;
use triage_gate_core::ExternalCardId;
use triage_gate_core::Justification;
use triage_gate_core::Persistence;

/// Result of one [`ReanalysisService::reanalyze`] call.
#[derive(Debug, Clone, Serialize)]
pub struct ReanalysisResult {
    /// Card identifier that was reanalyzed.
    pub card_id: String,
    /// Evaluated criticality, uppercase wire form, or `null` for out-of-context.
    pub criticality_level: Option<String>,
    /// Free-text justification.
    pub justification: String,
    /// Whether the evaluation succeeded.
    pub success: bool,
}

/// Errors surfaced by the reanalysis service.
#[derive(Debug, thiserror::Error)]
pub enum ReanalysisError {
    /// No ticket is tracked under the given external id.
    #[error("ticket not found")]
    TicketNotFound,
    /// The analyzer could not be reached or configured.
    #[error("analyzer error: {0}")]
    Analyzer(#[from] triage_gate_core::AnalyzerError),
    /// The commit failed.
    #[error("store error: {0}")]
    Store(#[from] triage_gate_core::StoreError),
}

/// Re-evaluates a single tracked ticket on demand.
pub struct ReanalysisService {
    /// LLM adapter.
    analyzer: Arc<dyn Analyzer>,
    /// Repository aggregate.
    persistence: Arc<dyn Persistence>,
    /// Board provider identifier stamped on the fresh board scope, e.g. `"trello"`.
    platform: String,
}

impl ReanalysisService {
    /// Builds a reanalysis service over the given collaborators.
    #[must_use]
    pub fn new(analyzer: Arc<dyn Analyzer>, persistence: Arc<dyn Persistence>, platform: impl Into<String>) -> Self {
        Self { analyzer, persistence, platform: platform.into() }
    }

    /// Re-evaluates the ticket tracked under `external_id` (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`ReanalysisError::TicketNotFound`] if no ticket is tracked
    /// under `external_id`; returns the underlying collaborator error
    /// otherwise.
    pub async fn reanalyze(&self, external_id: &ExternalCardId) -> Result<ReanalysisResult, ReanalysisError> {
        let ticket = self
            .persistence
            .get_ticket_by_external_id(external_id)
            .await?
            .ok_or(ReanalysisError::TicketNotFound)?;

        let previous = self.persistence.latest_history(ticket.id).await?;

        let card = Card {
            id: ticket.external_id.clone(),
            name: ticket.metadata.name.clone(),
            desc: ticket.metadata.desc.clone(),
            due: ticket.metadata.due.clone(),
            url: ticket.metadata.url.clone(),
            labels: ticket.metadata.labels.clone(),
            members: ticket.metadata.members.clone(),
        };
        let context = CardContext {
            card,
            board_id: ticket.metadata.board_id.clone(),
            board_name: ticket.metadata.board_name.clone(),
            list_id: ticket.metadata.list_id.clone(),
            list_name: ticket.metadata.list_name.clone(),
        };

        let outcome = self.analyzer.reanalyze(&context, previous.as_ref().map(|history| history.criticality)).await?;

        let Some(criticality) = outcome.criticality_level.to_criticality() else {
            return Ok(ReanalysisResult {
                card_id: external_id.as_str().to_string(),
                criticality_level: Some("OUT_OF_CONTEXT".to_string()),
                justification: outcome.justification,
                success: outcome.success,
            });
        };

        if !outcome.success {
            return Ok(ReanalysisResult {
                card_id: external_id.as_str().to_string(),
                criticality_level: None,
                justification: outcome.justification,
                success: false,
            });
        }

        let (session, _scope) = self.persistence.create_session(true, None, &self.platform).await?;
        let soft_result = serde_json::json!({
            "criticality_level": criticality.as_str().to_ascii_uppercase(),
            "justification": outcome.justification,
        });
        self.persistence
            .commit_reanalysis(
                ticket.id,
                session.id,
                criticality,
                Justification::new(outcome.justification.clone()),
                triage_gate_core::now_utc(),
                soft_result,
            )
            .await?;

        Ok(ReanalysisResult {
            card_id: external_id.as_str().to_string(),
            criticality_level: Some(criticality.as_str().to_ascii_uppercase()),
            justification: outcome.justification,
            success: true,
        })
    }
}
