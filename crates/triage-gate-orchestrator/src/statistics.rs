// crates/triage-gate-orchestrator/src/statistics.rs
// ============================================================================
// Module: Statistics Service
// Description: Read-only aggregation over History/Ticket/Session rows.
// Purpose: Power the reporting surface without side effects.
// Dependencies: triage-gate-core
// ============================================================================

//! ## Overview
//! [`StatisticsService::compute`] is a pure read: it loads every history,
//! ticket and session row once and folds them into the aggregate shape
//! described in §4.7.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use triage_gate_core::Criticality;
use triage_gate_core::Persistence;
use triage_gate_core::SessionId;
use triage_gate_core::StoreError;

/// Breakdown of history rows by criticality, plus the initial/reanalysis split.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CriticalityBreakdown {
    /// Count of `high` rows.
    pub high: u64,
    /// Count of `medium` rows.
    pub medium: u64,
    /// Count of `low` rows.
    pub low: u64,
}

impl CriticalityBreakdown {
    /// Records one observed criticality.
    fn record(&mut self, criticality: Criticality) {
        match criticality {
            Criticality::High => self.high += 1,
            Criticality::Medium => self.medium += 1,
            Criticality::Low => self.low += 1,
        }
    }
}

/// Per-board slice of the aggregate statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardBreakdown {
    /// Total evaluations recorded for this board.
    pub total_analyses: u64,
    /// Evaluations produced by a reanalysis session.
    pub reanalyses: u64,
    /// Evaluations produced by a bulk-run session.
    pub initial_analyses: u64,
    /// Criticality distribution for this board.
    pub criticality: CriticalityBreakdown,
}

/// Full aggregate returned by [`StatisticsService::compute`] (§4.7).
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    /// Total history rows across every session.
    pub total_analyses: u64,
    /// Total distinct tickets tracked.
    pub total_tickets: u64,
    /// History rows whose session has `reanalyse = true`.
    pub reanalyses: u64,
    /// `total_analyses - reanalyses`.
    pub initial_analyses: u64,
    /// `reanalyses / total_analyses * 100`, rounded to two decimals.
    pub reanalysis_rate: f64,
    /// Criticality distribution across every history row.
    pub criticality: CriticalityBreakdown,
    /// Per-board breakdown, keyed by board name.
    pub per_board: BTreeMap<String, BoardBreakdown>,
}

/// Computes read-only statistics over the full store.
pub struct StatisticsService {
    /// Repository aggregate.
    persistence: Arc<dyn Persistence>,
}

impl StatisticsService {
    /// Builds a statistics service over `persistence`.
    #[must_use]
    pub const fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Computes the full aggregate (§4.7). Pure read; no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any underlying read fails.
    pub async fn compute(&self) -> Result<Statistics, StoreError> {
        let history = self.persistence.all_history().await?;
        let tickets = self.persistence.all_tickets().await?;
        let sessions = self.persistence.all_sessions().await?;

        let reanalysis_sessions: std::collections::HashSet<SessionId> =
            sessions.iter().filter(|session| session.reanalyse).map(|session| session.id).collect();

        let board_name_by_ticket: BTreeMap<_, _> =
            tickets.iter().map(|ticket| (ticket.id, ticket.board_name.clone())).collect();

        let mut criticality = CriticalityBreakdown::default();
        let mut per_board: BTreeMap<String, BoardBreakdown> = BTreeMap::new();
        let mut reanalyses = 0u64;

        for row in &history {
            criticality.record(row.criticality);
            let is_reanalysis = reanalysis_sessions.contains(&row.session_id);
            if is_reanalysis {
                reanalyses += 1;
            }
            let board_name = board_name_by_ticket.get(&row.ticket_id).cloned().unwrap_or_default();
            let entry = per_board.entry(board_name).or_default();
            entry.total_analyses += 1;
            entry.criticality.record(row.criticality);
            if is_reanalysis {
                entry.reanalyses += 1;
            } else {
                entry.initial_analyses += 1;
            }
        }

        let total_analyses = u64::try_from(history.len()).unwrap_or(u64::MAX);
        let reanalysis_rate = if total_analyses == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss, reason = "history counts are small enough to round-trip exactly in f64")]
            let rate = (reanalyses as f64 / total_analyses as f64) * 100.0;
            (rate * 100.0).round() / 100.0
        };

        Ok(Statistics {
            total_analyses,
            total_tickets: u64::try_from(tickets.len()).unwrap_or(u64::MAX),
            reanalyses,
            initial_analyses: total_analyses - reanalyses,
            reanalysis_rate,
            criticality,
            per_board,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::CriticalityBreakdown;
    use triage_gate_core::Criticality;

    #[test]
    fn breakdown_records_each_level_independently() {
        let mut breakdown = CriticalityBreakdown::default();
        breakdown.record(Criticality::High);
        breakdown.record(Criticality::High);
        breakdown.record(Criticality::Low);
        assert_eq!(breakdown.high, 2);
        assert_eq!(breakdown.low, 1);
        assert_eq!(breakdown.medium, 0);
    }
}
