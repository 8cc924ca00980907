// crates/triage-gate-http/src/state.rs
// ============================================================================
// Module: Shared Server State
// Description: Collaborators and process-local caches shared by every handler.
// Purpose: Give handlers a single, cheaply cloneable handle to the wiring.
// Dependencies: tokio, triage-gate-core, triage-gate-orchestrator
// ============================================================================

//! ## Overview
//! [`AppState`] is built once at startup (see the `serve` entry point) and
//! cloned into every request. It carries the orchestrator and its
//! collaborators, plus a [`tokio::sync::Semaphore`] bounding concurrent
//! board/list analyze requests -- the same inflight-limiting shape the
//! underlying MCP transport uses to cap concurrent tool calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::Semaphore;
use triage_gate_core::Analyzer;
use triage_gate_core::BoardClient;
use triage_gate_core::EmbeddingStore;
use triage_gate_core::Persistence;
use triage_gate_orchestrator::Orchestrator;
use triage_gate_orchestrator::ReanalysisService;
use triage_gate_orchestrator::StatisticsService;

/// Maximum board/list analyze requests allowed to run concurrently.
const DEFAULT_MAX_INFLIGHT_ANALYZES: usize = 4;

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Fetch/classify/analyze/act/persist pipeline.
    pub orchestrator: Arc<Orchestrator>,
    /// Single-ticket reanalysis pipeline.
    pub reanalysis: Arc<ReanalysisService>,
    /// Read-only statistics aggregation.
    pub statistics: Arc<StatisticsService>,
    /// Repository aggregate, used directly by the config-subscription and
    /// cache-management endpoints.
    pub persistence: Arc<dyn Persistence>,
    /// Board provider adapter, used directly by the single-card action
    /// endpoints.
    pub board_client: Arc<dyn BoardClient>,
    /// LLM adapter, used directly by the ad-hoc single-card analyze endpoint.
    pub analyzer: Arc<dyn Analyzer>,
    /// Grounding store, used directly by the upload endpoint.
    pub grounding: Arc<dyn EmbeddingStore>,
    /// Board provider identifier stamped on fresh board scopes, e.g. `"trello"`.
    pub platform: String,
    /// Limits concurrent board/list analyze requests.
    pub analyze_inflight: Arc<Semaphore>,
    /// `(filename, content_hash)` pairs already ingested this process, mirroring
    /// the grounding store's own dedup key so the upload endpoint can report a
    /// duplicate without adding an existence probe to [`EmbeddingStore`].
    pub seen_uploads: Arc<Mutex<HashSet<(String, String)>>>,
    /// Hard ceiling on a single uploaded document, in bytes.
    pub max_content_length: u64,
}

impl AppState {
    /// Builds shared state over the given collaborators.
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        reanalysis: Arc<ReanalysisService>,
        statistics: Arc<StatisticsService>,
        persistence: Arc<dyn Persistence>,
        board_client: Arc<dyn BoardClient>,
        analyzer: Arc<dyn Analyzer>,
        grounding: Arc<dyn EmbeddingStore>,
        platform: impl Into<String>,
        max_content_length: u64,
    ) -> Self {
        Self {
            orchestrator,
            reanalysis,
            statistics,
            persistence,
            board_client,
            analyzer,
            grounding,
            platform: platform.into(),
            analyze_inflight: Arc::new(Semaphore::new(DEFAULT_MAX_INFLIGHT_ANALYZES)),
            seen_uploads: Arc::new(Mutex::new(HashSet::new())),
            max_content_length,
        }
    }
}
