// crates/triage-gate-cli/src/scheduler.rs
// ============================================================================
// Module: In-Process Poll Scheduler
// Description: Periodically runs analyze_list for every registered Config row.
// Purpose: Give the `serve` subcommand automatic, unattended board triage.
// Dependencies: tokio, triage-gate-core, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! [`run`] never returns under normal operation: every `poll_interval_secs`
//! it re-lists every [`triage_gate_core::Config`] row and runs one
//! [`Orchestrator::analyze_list`] pass per row, logging failures without
//! aborting the loop -- one misconfigured board must never stop every other
//! board's schedule.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use triage_gate_core::Persistence;
use triage_gate_orchestrator::Orchestrator;

/// Runs the poll loop until the process is terminated.
pub async fn run(persistence: Arc<dyn Persistence>, orchestrator: Arc<Orchestrator>, platform: String, poll_interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(poll_interval_secs));
    loop {
        ticker.tick().await;
        run_once(&persistence, &orchestrator, &platform).await;
    }
}

/// Runs a single pass over every registered config row.
async fn run_once(persistence: &Arc<dyn Persistence>, orchestrator: &Arc<Orchestrator>, platform: &str) {
    let configs = match persistence.list_configs().await {
        Ok(configs) => configs,
        Err(err) => {
            crate::write_stderr_line(&format!("scheduler: failed to list configs: {err}"));
            return;
        }
    };

    for config in configs {
        let snapshot = match serde_json::to_value(&config.data) {
            Ok(value) => value,
            Err(err) => {
                crate::write_stderr_line(&format!("scheduler: config {} snapshot failed: {err}", config.id));
                continue;
            }
        };
        let target_list = config.data.target_list_id.clone().zip(config.data.target_list_name.clone());

        let (session, scope) = match persistence.create_session(false, None, platform).await {
            Ok(pair) => pair,
            Err(err) => {
                crate::write_stderr_line(&format!("scheduler: config {} session creation failed: {err}", config.id));
                continue;
            }
        };

        let result = orchestrator
            .analyze_list(
                &config.data.board_id,
                &config.data.list_id,
                &config.data.board_name,
                &config.data.list_name,
                Some(scope.id),
                Some(session.id),
                snapshot,
                target_list,
            )
            .await;

        if let Err(err) = result {
            crate::write_stderr_line(&format!("scheduler: config {} analyze_list failed: {err}", config.id));
        }
    }
}
