// crates/triage-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Triage Gate Interfaces
// Description: Trait boundaries between the orchestrator and its collaborators.
// Purpose: Let the orchestrator depend on behavior, not on board/LLM/store backends.
// Dependencies: async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The orchestrator is written against these traits only. Concrete adapters
//! (HTTP board client, HTTP analyzer, SQLite persistence, vector-backed
//! grounding store) live in separate crates and are wired together at the
//! edge/CLI entry points.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::BoardScopeId;
use crate::core::identifiers::ConfigId;
use crate::core::identifiers::DocumentId;
use crate::core::identifiers::ExternalCardId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::SessionReference;
use crate::core::identifiers::TicketId;
use crate::core::state::AnalysisHistory;
use crate::core::state::AnalysisSession;
use crate::core::state::BoardScope;
use crate::core::state::Config;
use crate::core::state::ConfigData;
use crate::core::state::Criticality;
use crate::core::state::CriticalityOutcome;
use crate::core::state::Justification;
use crate::core::state::Ticket;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Cards
// ============================================================================

/// One card as fetched from the board provider.
///
/// # Invariants
/// - Field shape matches the provider-agnostic subset the orchestrator needs;
///   adapters are responsible for mapping their wire format onto this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Provider card identifier.
    pub id: ExternalCardId,
    /// Card title.
    pub name: String,
    /// Card description.
    pub desc: String,
    /// Card due date, opaque provider string.
    pub due: Option<String>,
    /// Card URL on the provider.
    pub url: String,
    /// Card labels, by name.
    pub labels: Vec<String>,
    /// Card member identifiers.
    pub members: Vec<String>,
}

/// A [`Card`] annotated with the board/list it was fetched from.
///
/// # Invariants
/// - None beyond those of [`Card`]; this is a read-only view handed to the
///   analyzer and is never itself persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContext {
    /// The underlying card.
    pub card: Card,
    /// Provider board identifier.
    pub board_id: String,
    /// Human-readable board name.
    pub board_name: String,
    /// Provider list identifier.
    pub list_id: String,
    /// Human-readable list name.
    pub list_name: String,
}

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// Outcome of evaluating a single card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerOutcome {
    /// Card identifier this outcome is for.
    pub card_id: ExternalCardId,
    /// Card title, echoed back for convenience.
    pub card_name: String,
    /// Evaluated criticality outcome.
    pub criticality_level: CriticalityOutcome,
    /// Free-text justification.
    pub justification: String,
    /// Whether evaluation completed without a fatal failure.
    pub success: bool,
    /// Error detail when `success` is `false`.
    pub error: Option<String>,
}

/// Failures the analyzer can surface to its caller.
///
/// # Invariants
/// - Transient per-card LLM failures are *not* reported through this type;
///   they are caught internally and reported as `AnalyzerOutcome { success:
///   false, .. }` so a single bad card never aborts a batch.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The grounding or similarity-search collaborator failed.
    #[error("grounding lookup failed: {0}")]
    Grounding(#[from] GroundingStoreError),
    /// The analyzer could not be constructed or configured.
    #[error("analyzer configuration error: {0}")]
    Configuration(String),
}

/// LLM adapter: prompt assembly, calls, response parsing, fallback.
///
/// # Invariants
/// - `analyze_batch` never returns fewer outcomes than `cards`; any id
///   missing or unparsable from the underlying batch call is individually
///   re-evaluated via `analyze_one` before returning.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Evaluates a single card.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] only for configuration/grounding failures
    /// that prevent any evaluation attempt; transient LLM failures are
    /// reported via `AnalyzerOutcome::success = false` instead.
    async fn analyze_one(&self, card: &CardContext) -> Result<AnalyzerOutcome, AnalyzerError>;

    /// Evaluates a batch of cards, self-healing missing/unparsable entries.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] only for configuration/grounding failures.
    async fn analyze_batch(
        &self,
        cards: &[CardContext],
    ) -> Result<Vec<AnalyzerOutcome>, AnalyzerError>;

    /// Re-evaluates a single card for the reanalysis flow, given its
    /// previously recorded criticality (if any).
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] only for configuration/grounding failures.
    async fn reanalyze(
        &self,
        card: &CardContext,
        previous: Option<Criticality>,
    ) -> Result<AnalyzerOutcome, AnalyzerError>;
}

// ============================================================================
// SECTION: Board Client
// ============================================================================

/// Failures from the board provider's REST API.
#[derive(Debug, Error)]
pub enum BoardClientError {
    /// The request could not be sent or the response could not be read.
    #[error("board transport error: {0}")]
    Transport(String),
    /// The provider returned a non-2xx status.
    #[error("board api error: status {status}, body {body}")]
    Status {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body, truncated to a safe diagnostic length.
        body: String,
    },
    /// The response body could not be decoded into the expected shape.
    #[error("board response decode error: {0}")]
    InvalidResponse(String),
}

/// Typed wrapper over the board provider's REST API.
///
/// # Invariants
/// - `add_label` guarantees the card carries exactly one priority label
///   after it returns successfully (see [`crate::core::state::Criticality`]).
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Lists the cards currently on `list_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardClientError`] on any transport or provider failure.
    async fn get_list_cards(&self, list_id: &str) -> Result<Vec<Card>, BoardClientError>;

    /// Applies the unique priority label for `level`, removing any other
    /// priority label first.
    ///
    /// # Errors
    ///
    /// Returns [`BoardClientError`] on any transport or provider failure.
    async fn add_label(
        &self,
        card_id: &str,
        board_id: &str,
        level: Criticality,
    ) -> Result<(), BoardClientError>;

    /// Posts `text` as a comment, prefixed with the agent marker.
    ///
    /// # Errors
    ///
    /// Returns [`BoardClientError`] on any transport or provider failure.
    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardClientError>;

    /// Moves the card to `new_list_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardClientError`] on any transport or provider failure.
    async fn move_card(&self, card_id: &str, new_list_id: &str) -> Result<(), BoardClientError>;
}

// ============================================================================
// SECTION: Grounding Store
// ============================================================================

/// One chunk returned from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarChunk {
    /// Document the chunk belongs to.
    pub document_id: DocumentId,
    /// Source filename.
    pub filename: String,
    /// Position of the chunk within its document.
    pub chunk_index: u32,
    /// Chunk text.
    pub content: String,
    /// Similarity score, higher is more similar.
    pub score: f32,
}

/// Failures from the grounding store or its backing vector database.
#[derive(Debug, Error)]
pub enum GroundingStoreError {
    /// A filesystem or storage-backend I/O failure.
    #[error("grounding store io error: {0}")]
    Io(String),
    /// The input could not be accepted (e.g. not valid UTF-8 text).
    #[error("grounding store rejected input: {0}")]
    InvalidInput(String),
    /// The similarity-search backend failed.
    #[error("grounding store backend error: {0}")]
    Backend(String),
}

/// Content-addressed document chunker and similarity index.
///
/// # Invariants
/// - `ingest` is idempotent: two calls with identical bytes return the same
///   [`DocumentId`] and never create additional chunk rows.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Ingests `bytes` under `filename`, chunking and indexing if new.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if `bytes` is not valid UTF-8 text or
    /// the backing store fails.
    async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<DocumentId, GroundingStoreError>;

    /// Reconstructs the full grounding context from all ingested chunks.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if the backing store fails.
    async fn read_context(&self) -> Result<String, GroundingStoreError>;

    /// Returns the top-`k` chunks most similar to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if the backing store fails.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SimilarChunk>, GroundingStoreError>;

    /// Returns `true` if no document has ever been ingested.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if the backing store fails.
    async fn is_empty(&self) -> Result<bool, GroundingStoreError>;
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Failures from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database driver returned an error.
    #[error("store db error: {0}")]
    Db(String),
    /// A row expected to exist was not found.
    #[error("store row not found: {0}")]
    NotFound(String),
    /// A stored JSON column could not be decoded.
    #[error("store decode error: {0}")]
    Decode(String),
}

/// One card's worth of pending writes for the end-of-run commit (§5: the
/// orchestrator serializes all persistence for a run into a single commit).
#[derive(Debug, Clone)]
pub struct PendingCardWrite {
    /// Scope the ticket should be anchored to if newly created.
    pub scope_id: BoardScopeId,
    /// The card as fetched this run.
    pub card: Card,
    /// Board identifier the card was observed on.
    pub board_id: String,
    /// Board name the card was observed on.
    pub board_name: String,
    /// List identifier the card was observed on.
    pub list_id: String,
    /// List name the card was observed on.
    pub list_name: String,
    /// Evaluated criticality to append as history.
    pub criticality: Criticality,
    /// Justification to append as history.
    pub justification: Justification,
    /// Timestamp the evaluation was recorded at.
    pub analyzed_at: Timestamp,
    /// New list the card was moved to, if a move occurred this run.
    pub moved_to: Option<(String, String)>,
    /// Deep, key-sorted snapshot of the config in force for this evaluation.
    pub config_snapshot: serde_json::Value,
}

/// Aggregate repository and unit-of-work boundary used by the orchestrator
/// and the reanalysis service.
///
/// # Invariants
/// - `commit_run` and `commit_reanalysis` each execute inside a single
///   logical transaction: either every row is written, or none is (§4.1
///   step 6, §4.6).
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Creates a new config row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn create_config(&self, data: ConfigData) -> Result<Config, StoreError>;

    /// Updates an existing config row in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` does not exist, or
    /// [`StoreError`] on any other database failure.
    async fn update_config(&self, id: ConfigId, data: ConfigData) -> Result<Config, StoreError>;

    /// Lists all config rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn list_configs(&self) -> Result<Vec<Config>, StoreError>;

    /// Fetches one config row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn get_config(&self, id: ConfigId) -> Result<Option<Config>, StoreError>;

    /// Creates a new session and its first board scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn create_session(
        &self,
        reanalyse: bool,
        reference: Option<SessionReference>,
        platform: &str,
    ) -> Result<(AnalysisSession, BoardScope), StoreError>;

    /// Fetches a ticket by its provider-assigned external id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn get_ticket_by_external_id(
        &self,
        external_id: &ExternalCardId,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Returns the most recent history row for a ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn latest_history(&self, ticket_id: TicketId) -> Result<Option<AnalysisHistory>, StoreError>;

    /// Returns all history rows for a ticket, chronologically ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn history_for_ticket(
        &self,
        ticket_id: TicketId,
    ) -> Result<Vec<AnalysisHistory>, StoreError>;

    /// Commits every pending write of one orchestrator run atomically and
    /// returns the newly appended history rows in input order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails; no partial writes
    /// are observable by any reader.
    async fn commit_run(
        &self,
        session_id: SessionId,
        writes: Vec<PendingCardWrite>,
    ) -> Result<Vec<AnalysisHistory>, StoreError>;

    /// Commits the single-ticket write of a reanalysis pass atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails.
    async fn commit_reanalysis(
        &self,
        ticket_id: TicketId,
        session_id: SessionId,
        criticality: Criticality,
        justification: Justification,
        analyzed_at: Timestamp,
        soft_result: serde_json::Value,
    ) -> Result<AnalysisHistory, StoreError>;

    /// Returns every history row in the store, for statistics aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn all_history(&self) -> Result<Vec<AnalysisHistory>, StoreError>;

    /// Returns every ticket row in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn all_tickets(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Returns every session row in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn all_sessions(&self) -> Result<Vec<AnalysisSession>, StoreError>;

    /// Clears the soft analysis-result cache on one ticket, or all tickets
    /// if `ticket_id` is `None`. Returns the number of tickets cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any database failure.
    async fn clear_cache(&self, ticket_id: Option<TicketId>) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Telemetry
// ============================================================================

/// Outcome classification recorded on a [`TelemetryEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOutcome {
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error,
}

/// One observability event emitted at a component boundary.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    /// Component that emitted the event, e.g. `"orchestrator"`, `"analyzer"`.
    pub component: &'static str,
    /// Operation name within the component, e.g. `"analyze_batch"`.
    pub operation: &'static str,
    /// Outcome of the operation.
    pub outcome: TelemetryOutcome,
    /// Operation latency, when measured.
    pub latency: Option<std::time::Duration>,
    /// Additional free-text detail, e.g. an error classification.
    pub detail: Option<String>,
}

impl TelemetryEvent {
    /// Builds a successful event with no latency or detail recorded.
    #[must_use]
    pub const fn ok(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            outcome: TelemetryOutcome::Ok,
            latency: None,
            detail: None,
        }
    }

    /// Builds a failed event carrying `detail`.
    #[must_use]
    pub const fn error(component: &'static str, operation: &'static str, detail: String) -> Self {
        Self {
            component,
            operation,
            outcome: TelemetryOutcome::Error,
            latency: None,
            detail: Some(detail),
        }
    }

    /// Attaches a measured latency to this event.
    #[must_use]
    pub const fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// Observability sink for [`TelemetryEvent`]s.
///
/// # Invariants
/// - Implementations must not block the caller meaningfully; recording is
///   best-effort and must never fail the operation it describes.
pub trait Telemetry: Send + Sync {
    /// Records one event.
    fn record(&self, event: TelemetryEvent);
}

/// Telemetry sink that discards every event.
///
/// # Invariants
/// - Always succeeds; used when no collector is configured.
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::NoopTelemetry;
    use super::Telemetry;
    use super::TelemetryEvent;

    #[test]
    fn noop_telemetry_accepts_any_event() {
        let telemetry = NoopTelemetry;
        telemetry.record(TelemetryEvent::ok("orchestrator", "analyze_list"));
        telemetry.record(TelemetryEvent::error(
            "analyzer",
            "analyze_batch",
            "timeout".to_string(),
        ));
    }
}
