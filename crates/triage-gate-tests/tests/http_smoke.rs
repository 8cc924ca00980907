// crates/triage-gate-tests/tests/http_smoke.rs
// ============================================================================
// Module: HTTP Edge Smoke Test
// Description: Boots the real router against a loopback port and drives it.
// Purpose: Catch wiring breaks the unit-level route handlers can't see.
// Dependencies: tokio, reqwest, triage-gate-http
// ============================================================================

//! Boots the real router against a loopback port and drives it.

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Test suite helpers keep documentation concise."
)]

use std::error::Error;
use std::net::TcpListener;
use std::sync::Arc;

use triage_gate_core::NoopTelemetry;
use triage_gate_grounding::SqliteEmbeddingStore;
use triage_gate_http::AppState;
use triage_gate_orchestrator::Orchestrator;
use triage_gate_orchestrator::ReanalysisService;
use triage_gate_orchestrator::StatisticsService;
use triage_gate_store_sqlite::SqlitePersistence;
use triage_gate_tests::FakeAnalyzer;
use triage_gate_tests::FakeBoardClient;

type TestResult = Result<(), Box<dyn Error>>;

/// Reserves an ephemeral loopback port and releases it for the server to bind.
fn reserve_loopback_address() -> Result<String, Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let address = listener.local_addr()?.to_string();
    drop(listener);
    Ok(address)
}

/// The `/healthz` route answers once the real router is served on a bound
/// socket, proving the CLI's wiring and the axum route table actually compose.
#[tokio::test]
async fn healthz_responds_over_a_real_socket() -> TestResult {
    let persistence = Arc::new(SqlitePersistence::open_in_memory()?);
    let grounding = Arc::new(SqliteEmbeddingStore::open_in_memory()?);
    let board_client = Arc::new(FakeBoardClient::new(Vec::new()));
    let analyzer = Arc::new(FakeAnalyzer::new());
    let orchestrator = Arc::new(Orchestrator::new(board_client.clone(), analyzer.clone(), persistence.clone(), Arc::new(NoopTelemetry)));
    let reanalysis = Arc::new(ReanalysisService::new(analyzer.clone(), persistence.clone(), "trello"));
    let statistics = Arc::new(StatisticsService::new(persistence.clone()));

    let state = AppState::new(orchestrator, reanalysis, statistics, persistence, board_client, analyzer, grounding, "trello", 1_000_000);

    let address = reserve_loopback_address()?;
    let server_address = address.clone();
    tokio::spawn(async move {
        let _ = triage_gate_http::serve(state, &server_address).await;
    });

    let url = format!("http://{address}/healthz");
    let mut last_error: Option<reqwest::Error> = None;
    for _ in 0..20 {
        match reqwest::get(&url).await {
            Ok(response) => {
                let status = response.status();
                let body: serde_json::Value = response.json().await?;
                if status.is_success() && body.get("status").is_some() {
                    return Ok(());
                }
                return Err(format!("unexpected health response: {status} {body}").into());
            }
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
    Err(format!("server never became reachable: {last_error:?}").into())
}
