// crates/triage-gate-cli/src/main.rs
// ============================================================================
// Module: Triage Gate CLI
// Description: Process entry point: serve, analyze-once and migrate subcommands.
// Purpose: The one binary operators run to stand up or drive the pipeline.
// Dependencies: clap, tokio, triage-gate-config, triage-gate-http
// ============================================================================

//! ## Overview
//! `triage-gate serve` loads [`AppConfig`], wires every collaborator through
//! [`wiring::Collaborators::build`], starts the in-process poll [`scheduler`]
//! and blocks serving the HTTP edge. `triage-gate analyze-once` runs a single
//! pass over one named config row and prints its summary. `triage-gate
//! migrate` only opens the store, which performs idempotent schema
//! initialization on open, and exits.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod scheduler;
mod wiring;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use triage_gate_config::AppConfig;
use triage_gate_core::ConfigId;
use triage_gate_http::AppState;

use crate::wiring::Collaborators;

/// Triage Gate: automated board-card triage over an LLM analyzer.
#[derive(Debug, Parser)]
#[command(name = "triage-gate", version)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Starts the HTTP edge and the in-process poll scheduler.
    Serve,
    /// Runs a single analysis pass over one registered config row.
    AnalyzeOnce {
        /// Identifier of the config row to analyze, as printed by the config endpoints.
        config_id: u64,
    },
    /// Opens the persistence store, initializing its schema, and exits.
    Migrate,
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout, without going through the `println!` macro
/// this workspace's lints deny.
pub(crate) fn write_stdout_line(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{message}");
}

/// Writes a single line to stderr, without going through the `eprintln!`
/// macro this workspace's lints deny.
pub(crate) fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "{message}");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: configuration error: {err}"));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve => run_serve(config).await,
        Command::AnalyzeOnce { config_id } => run_analyze_once(config, config_id).await,
        Command::Migrate => run_migrate(config),
    }
}

/// Starts the HTTP edge and the in-process poll scheduler.
async fn run_serve(config: AppConfig) -> ExitCode {
    let collaborators = match Collaborators::build(&config) {
        Ok(collaborators) => collaborators,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: failed to wire collaborators: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(
        collaborators.orchestrator.clone(),
        collaborators.reanalysis.clone(),
        collaborators.statistics.clone(),
        collaborators.persistence.clone(),
        collaborators.board_client.clone(),
        collaborators.analyzer.clone(),
        collaborators.grounding.clone(),
        config.board.platform.clone(),
        config.grounding.max_content_length,
    );

    tokio::spawn(scheduler::run(
        collaborators.persistence.clone(),
        collaborators.orchestrator.clone(),
        config.board.platform.clone(),
        config.scheduler.poll_interval_secs,
    ));

    let bind_address = config.http.bind_address();
    write_stdout_line(&format!("triage-gate: listening on {bind_address}"));
    match triage_gate_http::serve(state, &bind_address).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: server error: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Runs a single analysis pass over one named config row and prints its summary.
async fn run_analyze_once(config: AppConfig, config_id: u64) -> ExitCode {
    let Some(config_id) = ConfigId::from_raw(config_id) else {
        write_stderr_line("triage-gate: config id must be non-zero");
        return ExitCode::FAILURE;
    };

    let collaborators = match Collaborators::build(&config) {
        Ok(collaborators) => collaborators,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: failed to wire collaborators: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let row = match collaborators.persistence.get_config(config_id).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            write_stderr_line(&format!("triage-gate: no config row with id {config_id}"));
            return ExitCode::FAILURE;
        }
        Err(err) => {
            write_stderr_line(&format!("triage-gate: failed to load config {config_id}: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match serde_json::to_value(&row.data) {
        Ok(value) => value,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: failed to snapshot config {config_id}: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let target_list = row.data.target_list_id.clone().zip(row.data.target_list_name.clone());

    let (session, scope) = match collaborators.persistence.create_session(false, None, &config.board.platform).await {
        Ok(pair) => pair,
        Err(err) => {
            write_stderr_line(&format!("triage-gate: failed to create session for config {config_id}: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let summary = collaborators
        .orchestrator
        .analyze_list(
            &row.data.board_id,
            &row.data.list_id,
            &row.data.board_name,
            &row.data.list_name,
            Some(scope.id),
            Some(session.id),
            snapshot,
            target_list,
        )
        .await;

    match summary {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                write_stdout_line(&json);
                ExitCode::SUCCESS
            }
            Err(err) => {
                write_stderr_line(&format!("triage-gate: failed to render summary: {err}"));
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            write_stderr_line(&format!("triage-gate: analysis pass failed: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Opens the persistence store, initializing its schema, and exits.
fn run_migrate(config: AppConfig) -> ExitCode {
    match triage_gate_store_sqlite::SqlitePersistence::open(&config.persistence.db_path) {
        Ok(_) => {
            write_stdout_line(&format!("triage-gate: schema up to date at {}", config.persistence.db_path.display()));
            ExitCode::SUCCESS
        }
        Err(err) => {
            write_stderr_line(&format!("triage-gate: migration failed: {err}"));
            ExitCode::FAILURE
        }
    }
}
