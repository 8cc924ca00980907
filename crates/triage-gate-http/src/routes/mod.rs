// crates/triage-gate-http/src/routes/mod.rs
// ============================================================================
// Module: Routes
// Description: Handler groupings, one module per resource family.
// Purpose: Keep each handler focused on one collaborator call.
// Dependencies: axum
// ============================================================================

//! ## Overview
//! Mirrors the §6.1 endpoint groupings: board/card actions, config
//! subscriptions, analyses/tickets reporting, document upload, health.

pub mod analyses;
pub mod configs;
pub mod health;
pub mod trello;
pub mod uploads;
