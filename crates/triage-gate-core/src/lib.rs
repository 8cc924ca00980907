// crates/triage-gate-core/src/lib.rs
// ============================================================================
// Module: Triage Gate Core Library
// Description: Data model, identifiers and collaborator trait boundaries.
// Purpose: Shared vocabulary for the orchestrator, providers and storage crates.
// Dependencies: async-trait, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Triage Gate Core defines the tabular data model for the criticality
//! assessment engine (configs, sessions, tickets, history) and the trait
//! boundaries the orchestrator uses to reach its collaborators: the board
//! provider, the LLM analyzer, the grounding store and the persistence layer.
//! Invariants:
//! - `Criticality` is always stored lowercase; `CriticalityOutcome` adds the
//!   `OutOfContext` sentinel that never reaches persistence.
//! - `Ticket.external_id` is unique; `Ticket.board_scope_id` is frozen at
//!   first observation.
//! - `AnalysisHistory` rows are append-only.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Data model and identifier types.
pub mod core;
/// Collaborator trait boundaries.
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::identifiers::BoardScopeId;
pub use core::identifiers::ConfigId;
pub use core::identifiers::DocumentId;
pub use core::identifiers::ExternalCardId;
pub use core::identifiers::HistoryId;
pub use core::identifiers::SessionId;
pub use core::identifiers::SessionReference;
pub use core::identifiers::TicketId;
pub use core::state::AnalysisHistory;
pub use core::state::AnalysisSession;
pub use core::state::BoardScope;
pub use core::state::Config;
pub use core::state::ConfigData;
pub use core::state::Criticality;
pub use core::state::CriticalityOutcome;
pub use core::state::Justification;
pub use core::state::Ticket;
pub use core::state::TicketMetadata;
pub use core::time::Timestamp;
pub use core::time::now_utc;
pub use interfaces::Analyzer;
pub use interfaces::AnalyzerError;
pub use interfaces::AnalyzerOutcome;
pub use interfaces::BoardClient;
pub use interfaces::BoardClientError;
pub use interfaces::Card;
pub use interfaces::CardContext;
pub use interfaces::EmbeddingStore;
pub use interfaces::GroundingStoreError;
pub use interfaces::NoopTelemetry;
pub use interfaces::PendingCardWrite;
pub use interfaces::Persistence;
pub use interfaces::SimilarChunk;
pub use interfaces::StoreError;
pub use interfaces::Telemetry;
pub use interfaces::TelemetryEvent;
pub use interfaces::TelemetryOutcome;
