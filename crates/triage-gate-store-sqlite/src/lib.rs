// crates/triage-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Triage Gate SQLite Store
// Description: Durable Persistence implementation backed by SQLite.
// Purpose: Give the orchestrator a single-writer, WAL-mode relational store.
// Dependencies: triage-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqlitePersistence`] is the sole [`triage_gate_core::Persistence`]
//! implementation shipped in this workspace. It keeps five tables (configs,
//! sessions, board scopes, tickets, history) in one `SQLite` file opened in
//! WAL mode, and wraps every access in `tokio::task::spawn_blocking` since
//! `rusqlite` is synchronous.

pub mod store;

pub use store::SqlitePersistence;
