// crates/triage-gate-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: List Orchestrator
// Description: Runs one fetch/classify/analyze/act/persist pass over a list.
// Purpose: Drive a single board list's triage run end to end.
// Dependencies: triage-gate-core, tokio
// ============================================================================

//! ## Overview
//! [`Orchestrator::analyze_list`] is the single entry point the HTTP edge and
//! the scheduler both call. It never raises on a per-card failure: a card
//! that cannot be labeled, commented on, or moved is recorded with an error
//! in its own result and the run continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use triage_gate_core::Analyzer;
use triage_gate_core::AnalyzerOutcome;
use triage_gate_core::BoardClient;
use triage_gate_core::BoardScopeId;
use triage_gate_core::Card;
use triage_gate_core::CardContext;
use triage_gate_core::Criticality;
use triage_gate_core::Justification;
use triage_gate_core::PendingCardWrite;
use triage_gate_core::Persistence;
use triage_gate_core::SessionId;
use triage_gate_core::Telemetry;
use triage_gate_core::TelemetryEvent;
use triage_gate_core::Timestamp;

/// Default number of cards per analyzer batch call.
const DEFAULT_BATCH_SIZE: usize = 8;

/// Default number of batches allowed in flight at once.
const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

/// Per-card result surfaced to the caller (§4.1 output).
#[derive(Debug, Clone, Serialize)]
#[allow(clippy::struct_excessive_bools, reason = "mirrors the flat per-card result shape returned over HTTP")]
pub struct CardAnalysisEntry {
    /// Card identifier.
    pub card_id: String,
    /// Card title.
    pub card_name: String,
    /// Evaluated criticality, uppercase wire form, or `null` on failure.
    pub criticality_level: Option<String>,
    /// Free-text justification.
    pub justification: String,
    /// Whether this result came from the cache rather than a fresh call.
    pub from_cache: bool,
    /// Whether every downstream action succeeded.
    pub success: bool,
    /// Error detail, set when any phase for this card failed.
    pub error: Option<String>,
    /// Whether the card was moved to a target list this run.
    pub card_moved: bool,
    /// Target list id, set only when `card_moved` is `true`.
    pub target_list_id: Option<String>,
    /// Target list name, set only when `card_moved` is `true`.
    pub target_list_name: Option<String>,
}

/// Aggregate counts for one run (§4.1: `CRITICAL_TOTAL`, `success_rate`).
#[derive(Debug, Clone, Serialize)]
pub struct BoardAnalysisSummary {
    /// Total cards fetched this run.
    pub total_cards: usize,
    /// Count of cards whose evaluation succeeded.
    pub critical_total: usize,
    /// Always zero; retained for parity with the historical summary shape.
    pub non_critical: usize,
    /// Count of successful `HIGH` evaluations.
    pub high_count: usize,
    /// Count of successful `MEDIUM` evaluations.
    pub medium_count: usize,
    /// Count of successful `LOW` evaluations.
    pub low_count: usize,
    /// `successful / total * 100`, rounded to two decimals.
    pub success_rate: f64,
    /// Timestamp the run completed.
    pub analyzed_at: Timestamp,
}

/// Full result of one `analyzeList` call.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeListSummary {
    /// Aggregate counts.
    pub board_analysis: BoardAnalysisSummary,
    /// Per-card results, in fetch order.
    pub cards_analysis: Vec<CardAnalysisEntry>,
    /// Number of tickets persisted this run, when a board scope was supplied.
    pub tickets_saved_count: Option<usize>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Coordinates the board client, analyzer and persistence for one list run.
pub struct Orchestrator {
    /// Board provider adapter.
    board_client: Arc<dyn BoardClient>,
    /// LLM adapter.
    analyzer: Arc<dyn Analyzer>,
    /// Repository aggregate.
    persistence: Arc<dyn Persistence>,
    /// Observability sink.
    telemetry: Arc<dyn Telemetry>,
    /// Cards per analyzer batch call.
    batch_size: usize,
    /// Maximum analyzer batches in flight at once.
    max_concurrent_batches: usize,
}

/// A card queued for fresh evaluation, carrying the context it was fetched with.
struct PendingEvaluation {
    /// Index into the original fetch order, used to reassemble results in order.
    index: usize,
    /// The card in its board/list context.
    context: CardContext,
}

/// A card whose cached history can be reused without calling the analyzer.
struct CachedEvaluation {
    /// Index into the original fetch order.
    index: usize,
    /// The card, preserved for the per-card result entry.
    card: Card,
    /// The reused criticality and justification.
    criticality: Criticality,
    /// The reused justification text.
    justification: String,
}

impl Orchestrator {
    /// Builds an orchestrator with the default batch size and concurrency.
    #[must_use]
    pub fn new(
        board_client: Arc<dyn BoardClient>,
        analyzer: Arc<dyn Analyzer>,
        persistence: Arc<dyn Persistence>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            board_client,
            analyzer,
            persistence,
            telemetry,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }

    /// Overrides the batch size and in-flight batch cap.
    #[must_use]
    pub const fn with_concurrency(mut self, batch_size: usize, max_concurrent_batches: usize) -> Self {
        self.batch_size = batch_size;
        self.max_concurrent_batches = max_concurrent_batches;
        self
    }

    /// Runs one fetch/classify/analyze/act/persist pass over `list_id`.
    ///
    /// `config_snapshot` is the deep, key-sorted JSON form of the config
    /// currently in force for `(board_id, list_id)`; it both drives the
    /// cache-validity check and is stamped onto every ticket touched this
    /// run. `target_list` is the configured move destination, if any.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the initial card fetch fails; every other
    /// failure is captured per-card in the returned summary (§4.1).
    #[allow(clippy::too_many_arguments, reason = "mirrors the orchestrator contract in full")]
    pub async fn analyze_list(
        &self,
        board_id: &str,
        list_id: &str,
        board_name: &str,
        list_name: &str,
        board_scope_id: Option<BoardScopeId>,
        session_id: Option<SessionId>,
        config_snapshot: serde_json::Value,
        target_list: Option<(String, String)>,
    ) -> Result<AnalyzeListSummary, String> {
        let cards = self.board_client.get_list_cards(list_id).await.map_err(|err| {
            self.telemetry.record(TelemetryEvent::error("orchestrator", "fetch", err.to_string()));
            err.to_string()
        })?;

        if cards.is_empty() {
            return Ok(empty_summary());
        }

        let (cached, pending) = self.classify(cards, board_id, board_name, list_id, list_name, &config_snapshot).await?;

        let analyzed = self.analyze_pending(pending).await?;

        let mut entries: Vec<Option<CardAnalysisEntry>> = vec![None; cached.len() + analyzed.len()];
        let mut pending_writes = Vec::new();

        for cached_entry in cached {
            entries[cached_entry.index] = Some(CardAnalysisEntry {
                card_id: cached_entry.card.id.as_str().to_string(),
                card_name: cached_entry.card.name.clone(),
                criticality_level: Some(uppercase_level(cached_entry.criticality)),
                justification: cached_entry.justification,
                from_cache: true,
                success: true,
                error: None,
                card_moved: false,
                target_list_id: None,
                target_list_name: None,
            });
        }

        for (index, context, outcome) in analyzed {
            let (entry, write) = self
                .act_and_persist(context, outcome, board_scope_id, &config_snapshot, &target_list)
                .await;
            entries[index] = Some(entry);
            if let Some(write) = write {
                pending_writes.push(write);
            }
        }

        let entries: Vec<CardAnalysisEntry> = entries.into_iter().flatten().collect();

        let tickets_saved_count = if let Some(session_id) = session_id {
            if pending_writes.is_empty() {
                Some(0)
            } else {
                let appended = self.persistence.commit_run(session_id, pending_writes).await.map_err(|err| {
                    self.telemetry.record(TelemetryEvent::error("orchestrator", "commit", err.to_string()));
                    err
                });
                match appended {
                    Ok(rows) => Some(rows.len()),
                    Err(_) => Some(0),
                }
            }
        } else {
            None
        };

        Ok(AnalyzeListSummary {
            board_analysis: summarize(entries.len(), &entries),
            cards_analysis: entries,
            tickets_saved_count,
        })
    }

    /// Splits fetched cards into cache hits and cards needing fresh evaluation.
    async fn classify(
        &self,
        cards: Vec<Card>,
        board_id: &str,
        board_name: &str,
        list_id: &str,
        list_name: &str,
        config_snapshot: &serde_json::Value,
    ) -> Result<(Vec<CachedEvaluation>, Vec<PendingEvaluation>), String> {
        let mut cached = Vec::new();
        let mut pending = Vec::new();
        for (index, card) in cards.into_iter().enumerate() {
            let reuse = self.find_reusable_history(&card, config_snapshot).await;
            match reuse {
                Some((criticality, justification)) => {
                    cached.push(CachedEvaluation { index, card, criticality, justification });
                }
                None => {
                    pending.push(PendingEvaluation {
                        index,
                        context: CardContext {
                            card,
                            board_id: board_id.to_string(),
                            board_name: board_name.to_string(),
                            list_id: list_id.to_string(),
                            list_name: list_name.to_string(),
                        },
                    });
                }
            }
        }
        Ok((cached, pending))
    }

    /// Looks up a cached, still-valid evaluation for `card` (§4.1 cache rule).
    async fn find_reusable_history(&self, card: &Card, config_snapshot: &serde_json::Value) -> Option<(Criticality, String)> {
        let ticket = self.persistence.get_ticket_by_external_id(&card.id).await.ok().flatten()?;
        if ticket.metadata.last_analysis_config.as_ref() != Some(config_snapshot) {
            return None;
        }
        let latest = self.persistence.latest_history(ticket.id).await.ok().flatten()?;
        Some((latest.criticality, latest.justification.justification))
    }

    /// Runs the analyzer over every pending card in fixed-size batches,
    /// bounding in-flight batches with a semaphore (§5).
    async fn analyze_pending(
        &self,
        pending: Vec<PendingEvaluation>,
    ) -> Result<Vec<(usize, CardContext, AnalyzerOutcome)>, String> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_batches.max(1)));
        let mut handles = Vec::new();
        for chunk in pending.chunks(self.batch_size.max(1)) {
            let chunk: Vec<PendingEvaluation> = chunk
                .iter()
                .map(|item| PendingEvaluation { index: item.index, context: item.context.clone() })
                .collect();
            let analyzer = Arc::clone(&self.analyzer);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let contexts: Vec<CardContext> = chunk.iter().map(|item| item.context.clone()).collect();
                let outcomes = analyzer.analyze_batch(&contexts).await;
                (chunk, outcomes)
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            let (chunk, outcomes) = handle.await.map_err(|err| err.to_string())?;
            match outcomes {
                Ok(outcomes) => {
                    for (item, outcome) in chunk.into_iter().zip(outcomes) {
                        results.push((item.index, item.context, outcome));
                    }
                }
                Err(err) => {
                    self.telemetry.record(TelemetryEvent::error("orchestrator", "analyze_batch", err.to_string()));
                    for item in chunk {
                        results.push((
                            item.index,
                            item.context.clone(),
                            failed_outcome(&item.context.card, err.to_string()),
                        ));
                    }
                }
            }
        }
        Ok(results)
    }

    /// Applies board actions for one successfully evaluated card and builds
    /// its result entry plus, on success, a pending write for the commit
    /// phase (§4.1 steps 4-5).
    async fn act_and_persist(
        &self,
        context: CardContext,
        outcome: AnalyzerOutcome,
        board_scope_id: Option<BoardScopeId>,
        config_snapshot: &serde_json::Value,
        target_list: &Option<(String, String)>,
    ) -> (CardAnalysisEntry, Option<PendingCardWrite>) {
        let card = context.card.clone();
        let Some(criticality) = outcome.criticality_level.to_criticality() else {
            return (
                CardAnalysisEntry {
                    card_id: card.id.as_str().to_string(),
                    card_name: card.name,
                    criticality_level: Some("OUT_OF_CONTEXT".to_string()),
                    justification: outcome.justification,
                    from_cache: false,
                    success: outcome.success,
                    error: outcome.error,
                    card_moved: false,
                    target_list_id: None,
                    target_list_name: None,
                },
                None,
            );
        };

        if !outcome.success {
            return (
                CardAnalysisEntry {
                    card_id: card.id.as_str().to_string(),
                    card_name: card.name,
                    criticality_level: None,
                    justification: outcome.justification,
                    from_cache: false,
                    success: false,
                    error: outcome.error,
                    card_moved: false,
                    target_list_id: None,
                    target_list_name: None,
                },
                None,
            );
        }

        let mut error = None;
        if let Err(err) = self.board_client.add_label(card.id.as_str(), &context.board_id, criticality).await {
            error = Some(format!("label: {err}"));
        }
        if error.is_none() {
            if let Err(err) = self.board_client.add_comment(card.id.as_str(), &outcome.justification).await {
                error = Some(format!("comment: {err}"));
            }
        }
        let mut moved_to = None;
        if error.is_none()
            && let Some((target_list_id, target_list_name)) = target_list
        {
            match self.board_client.move_card(card.id.as_str(), target_list_id).await {
                Ok(()) => moved_to = Some((target_list_id.clone(), target_list_name.clone())),
                Err(err) => error = Some(format!("move: {err}")),
            }
        }

        let analyzed_at = triage_gate_core::now_utc();
        let Some(scope_id) = board_scope_id else {
            return (
                CardAnalysisEntry {
                    card_id: card.id.as_str().to_string(),
                    card_name: card.name,
                    criticality_level: Some(uppercase_level(criticality)),
                    justification: outcome.justification,
                    from_cache: false,
                    success: error.is_none(),
                    error,
                    card_moved: moved_to.is_some(),
                    target_list_id: moved_to.as_ref().map(|(id, _)| id.clone()),
                    target_list_name: moved_to.as_ref().map(|(_, name)| name.clone()),
                },
                None,
            );
        };

        let write = PendingCardWrite {
            scope_id,
            card: card.clone(),
            board_id: context.board_id.clone(),
            board_name: context.board_name.clone(),
            list_id: context.list_id.clone(),
            list_name: context.list_name.clone(),
            criticality,
            justification: Justification::new(outcome.justification.clone()),
            analyzed_at,
            moved_to: moved_to.clone(),
            config_snapshot: config_snapshot.clone(),
        };

        (
            CardAnalysisEntry {
                card_id: card.id.as_str().to_string(),
                card_name: card.name,
                criticality_level: Some(uppercase_level(criticality)),
                justification: outcome.justification,
                from_cache: false,
                success: error.is_none(),
                error,
                card_moved: moved_to.is_some(),
                target_list_id: moved_to.as_ref().map(|(id, _)| id.clone()),
                target_list_name: moved_to.as_ref().map(|(_, name)| name.clone()),
            },
            Some(write),
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the zero-card summary short-circuit (§4.1 step 1).
fn empty_summary() -> AnalyzeListSummary {
    AnalyzeListSummary {
        board_analysis: BoardAnalysisSummary {
            total_cards: 0,
            critical_total: 0,
            non_critical: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            success_rate: 0.0,
            analyzed_at: triage_gate_core::now_utc(),
        },
        cards_analysis: Vec::new(),
        tickets_saved_count: None,
    }
}

/// Aggregates per-card entries into the board-level summary (§4.1).
fn summarize(total_cards: usize, entries: &[CardAnalysisEntry]) -> BoardAnalysisSummary {
    let successful = entries.iter().filter(|entry| entry.success).count();
    let high_count = entries.iter().filter(|entry| entry.success && entry.criticality_level.as_deref() == Some("HIGH")).count();
    let medium_count = entries.iter().filter(|entry| entry.success && entry.criticality_level.as_deref() == Some("MEDIUM")).count();
    let low_count = entries.iter().filter(|entry| entry.success && entry.criticality_level.as_deref() == Some("LOW")).count();
    #[allow(clippy::cast_precision_loss, reason = "card counts are small enough to round-trip exactly in f64")]
    let success_rate = if total_cards == 0 {
        0.0
    } else {
        round_two_decimals((successful as f64 / total_cards as f64) * 100.0)
    };
    BoardAnalysisSummary {
        total_cards,
        critical_total: successful,
        non_critical: 0,
        high_count,
        medium_count,
        low_count,
        success_rate,
        analyzed_at: triage_gate_core::now_utc(),
    }
}

/// Rounds `value` to two decimal places.
fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Converts a stored [`Criticality`] to its uppercase wire form.
fn uppercase_level(level: Criticality) -> String {
    level.as_str().to_ascii_uppercase()
}

/// Builds a fallback failure outcome when an entire batch call errors out.
fn failed_outcome(card: &Card, detail: String) -> AnalyzerOutcome {
    AnalyzerOutcome {
        card_id: card.id.clone(),
        card_name: card.name.clone(),
        criticality_level: triage_gate_core::CriticalityOutcome::Low,
        justification: String::new(),
        success: false,
        error: Some(detail),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::summarize;
    use super::CardAnalysisEntry;

    fn entry(level: &str, success: bool) -> CardAnalysisEntry {
        CardAnalysisEntry {
            card_id: "c1".to_string(),
            card_name: "name".to_string(),
            criticality_level: Some(level.to_string()),
            justification: "j".to_string(),
            from_cache: false,
            success,
            error: None,
            card_moved: false,
            target_list_id: None,
            target_list_name: None,
        }
    }

    #[test]
    fn success_rate_rounds_to_two_decimals() {
        let entries = vec![entry("HIGH", true), entry("LOW", true), entry("LOW", false)];
        let summary = summarize(3, &entries);
        assert_eq!(summary.critical_total, 2);
        assert!((summary.success_rate - 66.67).abs() < f64::EPSILON);
    }

    #[test]
    fn per_level_counts_only_include_successful_entries() {
        let entries = vec![entry("HIGH", true), entry("HIGH", false)];
        let summary = summarize(2, &entries);
        assert_eq!(summary.high_count, 1);
    }
}
