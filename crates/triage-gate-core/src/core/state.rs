// crates/triage-gate-core/src/core/state.rs
// ============================================================================
// Module: Triage Gate Data Model
// Description: Config, AnalysisSession, BoardScope, Ticket and AnalysisHistory rows.
// Purpose: Canonical in-memory representation of the persisted criticality model.
// Dependencies: crate::core::identifiers, crate::core::time, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines the tabular data model shared by every repository
//! implementation: [`Config`], [`AnalysisSession`], [`BoardScope`], [`Ticket`]
//! and [`AnalysisHistory`]. Rows are plain data; repositories own enforcement
//! of the cross-row invariants documented on each type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BoardScopeId;
use crate::core::identifiers::ConfigId;
use crate::core::identifiers::ExternalCardId;
use crate::core::identifiers::HistoryId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::SessionReference;
use crate::core::identifiers::TicketId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Criticality
// ============================================================================

/// Criticality level persisted on an [`AnalysisHistory`] row.
///
/// # Invariants
/// - Stored and compared in lowercase; the wire form for inbound/outbound
///   HTTP payloads is uppercase and is converted at the edge, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Requires immediate attention.
    High,
    /// Should be scheduled soon.
    Medium,
    /// Low business/operational impact.
    Low,
}

impl Criticality {
    /// Returns the canonical lowercase wire/storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Outcome of one [`crate::interfaces::Analyzer`] evaluation, including the
/// grounding-miss sentinel that the stored [`Criticality`] enum cannot represent.
///
/// # Invariants
/// - `OutOfContext` never reaches persistence as an [`AnalysisHistory`] row;
///   see the orchestrator's act/persist phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalityOutcome {
    /// Requires immediate attention.
    High,
    /// Should be scheduled soon.
    Medium,
    /// Low business/operational impact.
    Low,
    /// The card could not be evaluated against the available grounding context.
    OutOfContext,
}

impl CriticalityOutcome {
    /// Converts a storable outcome into a [`Criticality`], or `None` for
    /// [`CriticalityOutcome::OutOfContext`].
    #[must_use]
    pub const fn to_criticality(self) -> Option<Criticality> {
        match self {
            Self::High => Some(Criticality::High),
            Self::Medium => Some(Criticality::Medium),
            Self::Low => Some(Criticality::Low),
            Self::OutOfContext => None,
        }
    }
}

impl From<Criticality> for CriticalityOutcome {
    fn from(value: Criticality) -> Self {
        match value {
            Criticality::High => Self::High,
            Criticality::Medium => Self::Medium,
            Criticality::Low => Self::Low,
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Recognized payload of a [`Config`] row.
///
/// # Invariants
/// - `target_list_id` and `target_list_name` are either both present or both
///   absent; the repository enforces this on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigData {
    /// Provider credential bound to this watch.
    pub token: String,
    /// Provider board identifier.
    pub board_id: String,
    /// Human-readable board name, cached for display.
    pub board_name: String,
    /// Provider list identifier being watched.
    pub list_id: String,
    /// Human-readable list name, cached for display.
    pub list_name: String,
    /// List a successfully analyzed card is moved to, if configured.
    pub target_list_id: Option<String>,
    /// Human-readable name of `target_list_id`, cached for display.
    pub target_list_name: Option<String>,
}

/// Persisted intent to watch one (board, list) pair.
///
/// # Invariants
/// - `id` is unique and never reused after row creation.
/// - Created by the edge; updated in place; never deleted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Unique row identifier.
    pub id: ConfigId,
    /// Recognized configuration payload.
    pub data: ConfigData,
    /// Creation timestamp, set once.
    pub created_at: Timestamp,
    /// Last-modified timestamp, refreshed on every update.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: AnalysisSession
// ============================================================================

/// One logical evaluation run ("analyse").
///
/// # Invariants
/// - `reference` is unique across all sessions.
/// - Semantically immutable after creation except `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSession {
    /// Unique row identifier.
    pub id: SessionId,
    /// Unique human-readable reference, e.g. `analyse_20260801_0930`.
    pub reference: SessionReference,
    /// `false` for a bulk run, `true` for a single-ticket reanalysis.
    pub reanalyse: bool,
    /// Creation timestamp, set once.
    pub created_at: Timestamp,
    /// Last-modified timestamp, refreshed on every update.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: BoardScope
// ============================================================================

/// One (session, platform) tuple anchoring [`Ticket`] rows.
///
/// # Invariants
/// - Exactly one row per (session, platform) in the common case; multiple
///   platform rows per session are permitted but uncommon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardScope {
    /// Unique row identifier.
    pub id: BoardScopeId,
    /// Owning session.
    pub session_id: SessionId,
    /// Board provider identifier, e.g. `"trello"`.
    pub platform: String,
}

// ============================================================================
// SECTION: Ticket
// ============================================================================

/// Mutable, non-history metadata carried on a [`Ticket`] row.
///
/// # Invariants
/// - `last_analysis_config` is the deep, key-sorted JSON snapshot of the
///   [`ConfigData`] in force the last time this ticket was evaluated; cache
///   validity compares this field against the *current* config snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMetadata {
    /// Card title, as last observed.
    pub name: String,
    /// Card description, as last observed.
    pub desc: String,
    /// Card due date, as last observed (opaque provider string).
    pub due: Option<String>,
    /// Card URL on the provider.
    pub url: String,
    /// Card labels, as last observed.
    pub labels: Vec<String>,
    /// Card member identifiers, as last observed.
    pub members: Vec<String>,
    /// Provider board identifier the card currently lives on.
    pub board_id: String,
    /// Human-readable board name the card currently lives on.
    pub board_name: String,
    /// Provider list identifier the card currently lives on.
    pub list_id: String,
    /// Human-readable list name the card currently lives on.
    pub list_name: String,
    /// Timestamp of the most recent `moveCard`, if any.
    pub last_moved_at: Option<Timestamp>,
    /// Snapshot of the config payload used for the most recent evaluation.
    pub last_analysis_config: Option<serde_json::Value>,
    /// Soft cache of the most recent analysis result, for quick inspection.
    pub analysis_result: Option<serde_json::Value>,
}

impl TicketMetadata {
    /// Builds metadata from a freshly fetched card and the board/list it was
    /// observed on, with no history-derived fields populated yet.
    #[must_use]
    pub fn from_card(
        card: &crate::interfaces::Card,
        board_id: &str,
        board_name: &str,
        list_id: &str,
        list_name: &str,
    ) -> Self {
        Self {
            name: card.name.clone(),
            desc: card.desc.clone(),
            due: card.due.clone(),
            url: card.url.clone(),
            labels: card.labels.clone(),
            members: card.members.clone(),
            board_id: board_id.to_string(),
            board_name: board_name.to_string(),
            list_id: list_id.to_string(),
            list_name: list_name.to_string(),
            last_moved_at: None,
            last_analysis_config: None,
            analysis_result: None,
        }
    }
}

/// The canonical record of one externally-identified card.
///
/// # Invariants
/// - `external_id` is unique across all tickets; re-observing the same card
///   never creates a new row (see [`crate::interfaces::TicketRepo::ensure_ticket`]).
/// - `board_scope_id` identifies the *first* scope that observed this ticket
///   and is frozen thereafter, even if a later session observes the same
///   card under a different scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique row identifier.
    pub id: TicketId,
    /// Provider card identifier, globally unique.
    pub external_id: ExternalCardId,
    /// Scope that first observed this ticket; frozen after creation.
    pub board_scope_id: BoardScopeId,
    /// Board name, cached at creation time.
    pub board_name: String,
    /// Mutable, non-history metadata.
    pub metadata: TicketMetadata,
}

// ============================================================================
// SECTION: AnalysisHistory
// ============================================================================

/// Justification payload attached to one [`AnalysisHistory`] row.
///
/// # Invariants
/// - Carries a single `justification` key to match the persisted mapping
///   shape; kept as a struct (not a bare `String`) so the JSON column shape
///   is stable even if annotations are added later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    /// Free-text justification produced by the analyzer.
    pub justification: String,
}

impl Justification {
    /// Wraps a justification string.
    #[must_use]
    pub const fn new(justification: String) -> Self {
        Self { justification }
    }
}

/// Append-only record of one evaluation of one ticket.
///
/// # Invariants
/// - Never updated or deleted after insertion.
/// - Ordered chronologically by `analyzed_at` per ticket; the row with the
///   greatest `analyzed_at` for a given `ticket_id` defines its current
///   criticality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHistory {
    /// Unique row identifier.
    pub id: HistoryId,
    /// Ticket this evaluation belongs to.
    pub ticket_id: TicketId,
    /// Session this evaluation was produced by.
    pub session_id: SessionId,
    /// Evaluated criticality, always one of high/medium/low.
    pub criticality: Criticality,
    /// Justification produced by the analyzer.
    pub justification: Justification,
    /// UTC timestamp this evaluation was recorded at.
    pub analyzed_at: Timestamp,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::Criticality;
    use super::CriticalityOutcome;

    #[test]
    fn criticality_round_trips_lowercase_wire_form() {
        let json = serde_json::to_string(&Criticality::High).expect("serializable");
        assert_eq!(json, "\"high\"");
    }

    #[test]
    fn out_of_context_has_no_storable_criticality() {
        assert_eq!(CriticalityOutcome::OutOfContext.to_criticality(), None);
        assert_eq!(
            CriticalityOutcome::High.to_criticality(),
            Some(Criticality::High)
        );
    }

    #[test]
    fn criticality_promotes_into_outcome() {
        let outcome: CriticalityOutcome = Criticality::Medium.into();
        assert_eq!(outcome, CriticalityOutcome::Medium);
    }
}
