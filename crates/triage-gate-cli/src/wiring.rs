// crates/triage-gate-cli/src/wiring.rs
// ============================================================================
// Module: Collaborator Wiring
// Description: Builds every concrete adapter from an AppConfig.
// Purpose: Give every subcommand the same dependency-graph construction.
// Dependencies: triage-gate-config, triage-gate-grounding, triage-gate-providers, triage-gate-store-sqlite, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! [`Collaborators::build`] is the single place that turns an [`AppConfig`]
//! into the trait objects the orchestrator, the HTTP edge and the scheduler
//! all share.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use triage_gate_config::AppConfig;
use triage_gate_core::Analyzer;
use triage_gate_core::BoardClient;
use triage_gate_core::EmbeddingStore;
use triage_gate_core::NoopTelemetry;
use triage_gate_core::Persistence;
use triage_gate_grounding::SqliteEmbeddingStore;
use triage_gate_orchestrator::Orchestrator;
use triage_gate_orchestrator::ReanalysisService;
use triage_gate_orchestrator::StatisticsService;
use triage_gate_providers::HttpAnalyzer;
use triage_gate_providers::HttpBoardClient;
use triage_gate_store_sqlite::SqlitePersistence;

/// Failures building the collaborator graph.
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    /// The persistence store could not be opened.
    #[error("persistence open failed: {0}")]
    Store(String),
    /// The grounding store could not be opened.
    #[error("grounding store open failed: {0}")]
    Grounding(String),
    /// A collaborator could not be constructed from its configuration.
    #[error("collaborator configuration error: {0}")]
    Configuration(String),
}

/// Every collaborator wired from one [`AppConfig`].
pub struct Collaborators {
    /// Repository aggregate.
    pub persistence: Arc<dyn Persistence>,
    /// Grounding store.
    pub grounding: Arc<dyn EmbeddingStore>,
    /// Board provider adapter.
    pub board_client: Arc<dyn BoardClient>,
    /// LLM adapter.
    pub analyzer: Arc<dyn Analyzer>,
    /// Fetch/classify/analyze/act/persist pipeline.
    pub orchestrator: Arc<Orchestrator>,
    /// Single-ticket reanalysis pipeline.
    pub reanalysis: Arc<ReanalysisService>,
    /// Read-only statistics aggregation.
    pub statistics: Arc<StatisticsService>,
}

impl Collaborators {
    /// Builds every collaborator from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`WiringError`] if any store cannot be opened or any HTTP
    /// collaborator cannot be constructed.
    pub fn build(config: &AppConfig) -> Result<Self, WiringError> {
        let persistence: Arc<dyn Persistence> = Arc::new(
            SqlitePersistence::open(&config.persistence.db_path).map_err(|err| WiringError::Store(err.to_string()))?,
        );
        let grounding: Arc<dyn EmbeddingStore> = Arc::new(
            SqliteEmbeddingStore::open(&config.grounding.vector_db_path)
                .map_err(|err| WiringError::Grounding(err.to_string()))?,
        );
        let board_client: Arc<dyn BoardClient> = Arc::new(
            HttpBoardClient::new(config.board.client.clone(), config.board.client.api_key.clone())
                .map_err(|err| WiringError::Configuration(err.to_string()))?,
        );
        let analyzer: Arc<dyn Analyzer> = Arc::new(
            HttpAnalyzer::new(config.analyzer.clone(), Arc::clone(&grounding))
                .map_err(|err| WiringError::Configuration(err.to_string()))?,
        );
        let telemetry = Arc::new(NoopTelemetry);

        let orchestrator = Arc::new(
            Orchestrator::new(
                Arc::clone(&board_client),
                Arc::clone(&analyzer),
                Arc::clone(&persistence),
                telemetry,
            )
            .with_concurrency(config.scheduler.analysis_batch_size, config.scheduler.max_concurrent_batches),
        );
        let reanalysis = Arc::new(ReanalysisService::new(
            Arc::clone(&analyzer),
            Arc::clone(&persistence),
            config.board.platform.clone(),
        ));
        let statistics = Arc::new(StatisticsService::new(Arc::clone(&persistence)));

        Ok(Self { persistence, grounding, board_client, analyzer, orchestrator, reanalysis, statistics })
    }
}
