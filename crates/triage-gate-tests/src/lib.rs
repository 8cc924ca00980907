// crates/triage-gate-tests/src/lib.rs
// ============================================================================
// Module: Triage Gate Black-Box Test Fixtures
// Description: In-memory BoardClient/Analyzer fakes driving the orchestrator.
// Purpose: Exercise the invariants and end-to-end scenarios without a network.
// Dependencies: async-trait, triage-gate-core
// ============================================================================

//! ## Overview
//! These fakes stand in for [`triage_gate_core::BoardClient`] and
//! [`triage_gate_core::Analyzer`] so the tests under `tests/` can drive the
//! orchestrator and its collaborators against real
//! [`triage_gate_store_sqlite::SqlitePersistence`] and
//! [`triage_gate_grounding::SqliteEmbeddingStore`] in-memory instances,
//! end to end, with no network dependency.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use triage_gate_core::Analyzer;
use triage_gate_core::AnalyzerError;
use triage_gate_core::AnalyzerOutcome;
use triage_gate_core::BoardClient;
use triage_gate_core::BoardClientError;
use triage_gate_core::Card;
use triage_gate_core::CardContext;
use triage_gate_core::Criticality;
use triage_gate_core::CriticalityOutcome;

// ============================================================================
// SECTION: Fake Board Client
// ============================================================================

/// One recorded board action, for assertions in test bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    /// A label was applied to a card.
    Label {
        /// Card the label was applied to.
        card_id: String,
        /// Criticality level applied.
        level: Criticality,
    },
    /// A comment was posted to a card.
    Comment {
        /// Card the comment was posted to.
        card_id: String,
        /// Comment text.
        text: String,
    },
    /// A card was moved to a new list.
    Move {
        /// Card that was moved.
        card_id: String,
        /// Destination list id.
        new_list_id: String,
    },
}

/// In-memory [`BoardClient`] over a fixed card list, recording every action
/// taken against it.
#[derive(Default)]
pub struct FakeBoardClient {
    cards: Mutex<Vec<Card>>,
    actions: Mutex<Vec<RecordedAction>>,
    fail_fetch: Mutex<bool>,
}

impl FakeBoardClient {
    /// Builds a fake board client seeded with `cards`.
    #[must_use]
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards: Mutex::new(cards), actions: Mutex::new(Vec::new()), fail_fetch: Mutex::new(false) }
    }

    /// Makes the next (and every subsequent) `get_list_cards` call fail.
    pub fn fail_next_fetch(&self) {
        *self.fail_fetch.lock().expect("lock") = true;
    }

    /// Returns every action recorded so far, in call order.
    #[must_use]
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BoardClient for FakeBoardClient {
    async fn get_list_cards(&self, _list_id: &str) -> Result<Vec<Card>, BoardClientError> {
        if *self.fail_fetch.lock().expect("lock") {
            return Err(BoardClientError::Transport("fake fetch failure".to_string()));
        }
        Ok(self.cards.lock().expect("lock").clone())
    }

    async fn add_label(&self, card_id: &str, _board_id: &str, level: Criticality) -> Result<(), BoardClientError> {
        self.actions.lock().expect("lock").push(RecordedAction::Label { card_id: card_id.to_string(), level });
        Ok(())
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardClientError> {
        self.actions.lock().expect("lock").push(RecordedAction::Comment { card_id: card_id.to_string(), text: text.to_string() });
        Ok(())
    }

    async fn move_card(&self, card_id: &str, new_list_id: &str) -> Result<(), BoardClientError> {
        self.actions.lock().expect("lock").push(RecordedAction::Move { card_id: card_id.to_string(), new_list_id: new_list_id.to_string() });
        Ok(())
    }
}

// ============================================================================
// SECTION: Fake Analyzer
// ============================================================================

/// In-memory [`Analyzer`] returning a pre-programmed outcome per card id.
///
/// # Invariants
/// - A card id with no programmed outcome defaults to `LOW`/success, so a
///   scenario only needs to program the cards it cares about.
#[derive(Default)]
pub struct FakeAnalyzer {
    outcomes: Mutex<HashMap<String, AnalyzerOutcome>>,
    fail_batches: Mutex<bool>,
}

impl FakeAnalyzer {
    /// Builds an analyzer with no outcomes programmed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs the outcome returned for `card_id`.
    pub fn program(&self, card_id: &str, outcome: AnalyzerOutcome) {
        self.outcomes.lock().expect("lock").insert(card_id.to_string(), outcome);
    }

    /// Makes every `analyze_batch` call fail with a transport-shaped error,
    /// simulating the LLM endpoint being unreachable for an entire batch.
    pub fn fail_batches(&self) {
        *self.fail_batches.lock().expect("lock") = true;
    }

    /// Looks up the programmed outcome for `card`, or a default `LOW` success.
    fn outcome_for(&self, card: &Card) -> AnalyzerOutcome {
        self.outcomes.lock().expect("lock").get(card.id.as_str()).cloned().unwrap_or_else(|| AnalyzerOutcome {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            criticality_level: CriticalityOutcome::Low,
            justification: "default".to_string(),
            success: true,
            error: None,
        })
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze_one(&self, card: &CardContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        Ok(self.outcome_for(&card.card))
    }

    async fn analyze_batch(&self, cards: &[CardContext]) -> Result<Vec<AnalyzerOutcome>, AnalyzerError> {
        if *self.fail_batches.lock().expect("lock") {
            return Err(AnalyzerError::Configuration("fake batch failure".to_string()));
        }
        Ok(cards.iter().map(|context| self.outcome_for(&context.card)).collect())
    }

    async fn reanalyze(&self, card: &CardContext, _previous: Option<Criticality>) -> Result<AnalyzerOutcome, AnalyzerError> {
        Ok(self.outcome_for(&card.card))
    }
}

/// Builds a minimal [`Card`] for test fixtures.
#[must_use]
pub fn fixture_card(id: &str, name: &str) -> Card {
    Card {
        id: id.into(),
        name: name.to_string(),
        desc: format!("{name} description"),
        due: None,
        url: format!("https://example.invalid/cards/{id}"),
        labels: Vec::new(),
        members: Vec::new(),
    }
}
