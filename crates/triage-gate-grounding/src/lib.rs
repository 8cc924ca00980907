// crates/triage-gate-grounding/src/lib.rs
// ============================================================================
// Module: Triage Gate Grounding Library
// Description: Document chunking and a SQLite-backed similarity store.
// Purpose: Ground LLM prompts in uploaded context documents.
// Dependencies: triage-gate-core, rusqlite, md5, tokio
// ============================================================================

//! ## Overview
//! Provides the context-document side of the criticality engine: splitting
//! uploaded text into bounded chunks, storing them content-addressed by an
//! MD5 digest of the raw bytes, and serving both the full-context read used
//! to build the APPLICATION CONTEXT prompt block and the similarity search
//! used to find comparable prior cards.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod chunker;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteEmbeddingStore;
