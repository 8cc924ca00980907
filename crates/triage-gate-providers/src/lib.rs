// crates/triage-gate-providers/src/lib.rs
// ============================================================================
// Module: Triage Gate Providers
// Description: HTTP adapters for the board provider and the LLM analyzer.
// Purpose: Let the orchestrator depend on the core traits, not on wire formats.
// Dependencies: triage-gate-core, reqwest, serde, serde_json
// ============================================================================

//! ## Overview
//! This crate ships the two external collaborators the orchestrator reaches
//! over HTTP: the Kanban board provider ([`HttpBoardClient`]) and the LLM
//! analyzer ([`HttpAnalyzer`]). Both are defensive consumers: bounded
//! connect/request timeouts, no redirects, and classified errors instead of
//! silent retries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod analyzer;
pub mod board;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use analyzer::AnalyzerConfig;
pub use analyzer::HttpAnalyzer;
pub use board::BoardClientConfig;
pub use board::HttpBoardClient;
