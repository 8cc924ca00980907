// crates/triage-gate-providers/src/analyzer.rs
// ============================================================================
// Module: HTTP Analyzer
// Description: LLM adapter -- prompt assembly, calls, response parsing.
// Purpose: Evaluate a card's criticality against the ingested grounding context.
// Dependencies: triage-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The LLM is reached as a single opaque text-in/text-out endpoint (§4.2).
//! This module owns prompt assembly (`APPLICATION CONTEXT` +
//! `SIMILAR CARDS HISTORY`), the response parsing contract, and the
//! batch-to-single fallback that keeps one bad card from failing a whole run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use triage_gate_core::Analyzer;
use triage_gate_core::AnalyzerError;
use triage_gate_core::AnalyzerOutcome;
use triage_gate_core::CardContext;
use triage_gate_core::Criticality;
use triage_gate_core::CriticalityOutcome;
use triage_gate_core::EmbeddingStore;

/// Justification used when the grounding store has never been populated.
const EMPTY_CONTEXT_JUSTIFICATION: &str = "default LOW — upload a description document";

/// Number of similar prior cards pulled into the prompt.
const SIMILAR_CARDS_K: usize = 3;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`HttpAnalyzer`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// LLM endpoint URL.
    pub endpoint_url: String,
    /// LLM provider API key.
    pub api_key: String,
    /// Model name sent with every request.
    pub model: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-call timeout in milliseconds; bounds a single-card evaluation (§5).
    pub request_timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// HTTP-backed [`Analyzer`].
///
/// # Invariants
/// - Never raises [`AnalyzerError`] for a transient per-card LLM failure;
///   those are captured as `AnalyzerOutcome { success: false, .. }`.
pub struct HttpAnalyzer {
    /// Client configuration.
    config: AnalyzerConfig,
    /// HTTP client configured with timeouts.
    client: Client,
    /// Grounding store backing prompt context and similarity search.
    grounding: Arc<dyn EmbeddingStore>,
}

impl HttpAnalyzer {
    /// Builds a new analyzer bound to `grounding`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(config: AnalyzerConfig, grounding: Arc<dyn EmbeddingStore>) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| AnalyzerError::Configuration(err.to_string()))?;
        Ok(Self {
            config,
            client,
            grounding,
        })
    }

    /// Calls the LLM with `prompt`, returning the raw response text.
    async fn call_llm(&self, prompt: &str) -> Result<String, String> {
        let request = LlmRequestWire {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
        };
        let response = self
            .client
            .post(&self.config.endpoint_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("llm endpoint returned status {}", response.status()));
        }
        let body: LlmResponseWire = response.json().await.map_err(|err| err.to_string())?;
        Ok(body.text)
    }

    /// Builds the `APPLICATION CONTEXT` + `SIMILAR CARDS HISTORY` prefix, or
    /// `None` if the grounding store has never been populated.
    async fn context_prefix(&self, query: &str) -> Result<Option<String>, AnalyzerError> {
        if self.grounding.is_empty().await? {
            return Ok(None);
        }
        let context = self.grounding.read_context().await?;
        let similar = self.grounding.similarity_search(query, SIMILAR_CARDS_K).await?;
        let mut prefix = format!("APPLICATION CONTEXT\n{context}\n\n");
        prefix.push_str("SIMILAR CARDS HISTORY\n");
        if similar.is_empty() {
            prefix.push_str("(none found)\n");
        } else {
            for chunk in similar {
                let _ = writeln!(prefix, "- [{}] {}", chunk.filename, chunk.content);
            }
        }
        Ok(Some(prefix))
    }

    /// Evaluates one card once the context prefix is already known, so the
    /// batch path can reuse a single grounding lookup across all cards.
    async fn evaluate_with_prefix(
        &self,
        card: &CardContext,
        prefix: Option<&str>,
        directive: &str,
    ) -> AnalyzerOutcome {
        let Some(prefix) = prefix else {
            return AnalyzerOutcome {
                card_id: card.card.id.clone(),
                card_name: card.card.name.clone(),
                criticality_level: CriticalityOutcome::Low,
                justification: EMPTY_CONTEXT_JUSTIFICATION.to_string(),
                success: true,
                error: None,
            };
        };
        let prompt = format!("{prefix}\n{directive}\n{}", describe_card(card));
        match self.call_llm(&prompt).await {
            Ok(text) => {
                let criticality_level = parse_single_level(&text);
                AnalyzerOutcome {
                    card_id: card.card.id.clone(),
                    card_name: card.card.name.clone(),
                    criticality_level,
                    justification: text,
                    success: true,
                    error: None,
                }
            }
            Err(err) => AnalyzerOutcome {
                card_id: card.card.id.clone(),
                card_name: card.card.name.clone(),
                criticality_level: CriticalityOutcome::Low,
                justification: String::new(),
                success: false,
                error: Some(err),
            },
        }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze_one(&self, card: &CardContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        let prefix = self.context_prefix(&describe_card(card)).await?;
        Ok(self.evaluate_with_prefix(card, prefix.as_deref(), SINGLE_CARD_DIRECTIVE).await)
    }

    async fn analyze_batch(&self, cards: &[CardContext]) -> Result<Vec<AnalyzerOutcome>, AnalyzerError> {
        if cards.is_empty() {
            return Ok(Vec::new());
        }
        let combined_query = cards.iter().map(describe_card).collect::<Vec<_>>().join("\n");
        let Some(prefix) = self.context_prefix(&combined_query).await? else {
            let mut outcomes = Vec::with_capacity(cards.len());
            for card in cards {
                outcomes.push(self.evaluate_with_prefix(card, None, SINGLE_CARD_DIRECTIVE).await);
            }
            return Ok(outcomes);
        };

        let mut prompt = format!("{prefix}\n{BATCH_DIRECTIVE}\n");
        for card in cards {
            let _ = writeln!(prompt, "{}", describe_card(card));
        }
        let raw = match self.call_llm(&prompt).await {
            Ok(text) => text,
            Err(_) => return self.fallback_each(cards, Some(prefix.as_str())).await,
        };

        let Some(entries) = parse_batch_entries(&raw) else {
            return self.fallback_each(cards, Some(prefix.as_str())).await;
        };

        let mut outcomes = Vec::with_capacity(cards.len());
        for card in cards {
            let found = entries.iter().find(|entry| entry.id == card.card.id.as_str());
            match found {
                Some(entry) => outcomes.push(AnalyzerOutcome {
                    card_id: card.card.id.clone(),
                    card_name: card.card.name.clone(),
                    criticality_level: entry.criticality_level,
                    justification: entry.justification.clone(),
                    success: true,
                    error: None,
                }),
                None => outcomes.push(self.evaluate_with_prefix(card, Some(prefix.as_str()), SINGLE_CARD_DIRECTIVE).await),
            }
        }
        Ok(outcomes)
    }

    async fn reanalyze(
        &self,
        card: &CardContext,
        previous: Option<Criticality>,
    ) -> Result<AnalyzerOutcome, AnalyzerError> {
        let directive = match previous {
            Some(level) => format!(
                "{REANALYSIS_DIRECTIVE} The previous evaluation was {}.",
                level.as_str().to_uppercase()
            ),
            None => REANALYSIS_DIRECTIVE.to_string(),
        };
        let prefix = self.context_prefix(&describe_card(card)).await?;
        Ok(self.evaluate_with_prefix(card, prefix.as_deref(), &directive).await)
    }
}

impl HttpAnalyzer {
    /// Evaluates every card individually, reusing an already-computed prefix.
    async fn fallback_each(
        &self,
        cards: &[CardContext],
        prefix: Option<&str>,
    ) -> Result<Vec<AnalyzerOutcome>, AnalyzerError> {
        let mut outcomes = Vec::with_capacity(cards.len());
        for card in cards {
            outcomes.push(self.evaluate_with_prefix(card, prefix, SINGLE_CARD_DIRECTIVE).await);
        }
        Ok(outcomes)
    }
}

// ============================================================================
// SECTION: Prompt Text
// ============================================================================

/// Directive appended when evaluating a single card.
const SINGLE_CARD_DIRECTIVE: &str =
    "Evaluate the criticality of the following card as HIGH, MEDIUM, LOW or OUT_OF_CONTEXT, with a short justification:";

/// Directive appended when evaluating a batch of cards.
const BATCH_DIRECTIVE: &str = "Evaluate the criticality of each of the following cards. \
Respond with a JSON array of objects {\"id\": ..., \"criticality_level\": ..., \"justification\": ...}, one per card:";

/// Directive appended for a reanalysis pass.
const REANALYSIS_DIRECTIVE: &str =
    "Re-evaluate the criticality of the following card as HIGH, MEDIUM, LOW or OUT_OF_CONTEXT, with a short justification.";

/// Renders the fields the prompt needs from one card.
fn describe_card(card: &CardContext) -> String {
    format!(
        "id: {}\nname: {}\ndesc: {}\nboard: {}\nlist: {}\nlabels: {}",
        card.card.id,
        card.card.name,
        card.card.desc,
        card.board_name,
        card.list_name,
        card.card.labels.join(", ")
    )
}

// ============================================================================
// SECTION: Response Parsing
// ============================================================================

/// Parses a single-card response into a [`CriticalityOutcome`] per the
/// response-parsing contract of §4.2.
fn parse_single_level(text: &str) -> CriticalityOutcome {
    if text.contains("OUT_OF_CONTEXT") {
        return CriticalityOutcome::OutOfContext;
    }
    let candidates = [
        ("HIGH", CriticalityOutcome::High),
        ("MEDIUM", CriticalityOutcome::Medium),
        ("LOW", CriticalityOutcome::Low),
    ];
    candidates
        .into_iter()
        .filter_map(|(token, outcome)| text.find(token).map(|index| (index, outcome)))
        .min_by_key(|(index, _)| *index)
        .map_or(CriticalityOutcome::Low, |(_, outcome)| outcome)
}

/// Extracts the substring between the first `[` and the last `]`, tolerating
/// fenced or prose text around the array.
fn extract_array_substring(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end >= start).then(|| &text[start..=end])
}

/// Parses a batch response into per-card entries, or `None` if the response
/// does not contain a well-formed JSON array.
fn parse_batch_entries(text: &str) -> Option<Vec<BatchEntryWire>> {
    let array_text = extract_array_substring(text)?;
    serde_json::from_str(array_text).ok()
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Request body sent to the LLM endpoint.
#[derive(Debug, Serialize)]
struct LlmRequestWire {
    /// Model name.
    model: String,
    /// Assembled prompt.
    prompt: String,
}

/// Response body returned by the LLM endpoint.
#[derive(Debug, Deserialize)]
struct LlmResponseWire {
    /// Raw generated text.
    text: String,
}

/// One entry of a parsed batch response.
#[derive(Debug, Clone, Deserialize)]
struct BatchEntryWire {
    /// Card identifier the entry is for.
    id: String,
    /// Evaluated criticality.
    criticality_level: CriticalityOutcome,
    /// Free-text justification.
    justification: String,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::extract_array_substring;
    use super::parse_batch_entries;
    use super::parse_single_level;
    use triage_gate_core::CriticalityOutcome;

    #[test]
    fn out_of_context_wins_regardless_of_position() {
        let text = "LOW but actually OUT_OF_CONTEXT given the available documents";
        assert_eq!(parse_single_level(text), CriticalityOutcome::OutOfContext);
    }

    #[test]
    fn first_matching_level_wins() {
        let text = "This looks MEDIUM, not HIGH, justification follows.";
        assert_eq!(parse_single_level(text), CriticalityOutcome::Medium);
    }

    #[test]
    fn unparsable_text_defaults_to_low() {
        assert_eq!(parse_single_level("no recognizable level here"), CriticalityOutcome::Low);
    }

    #[test]
    fn array_substring_tolerates_fenced_text() {
        let text = "```json\n[{\"a\":1}]\n```";
        assert_eq!(extract_array_substring(text), Some("[{\"a\":1}]"));
    }

    #[test]
    fn batch_entries_parse_from_fenced_array() {
        let text = "Sure, here you go:\n[{\"id\":\"c1\",\"criticality_level\":\"HIGH\",\"justification\":\"urgent\"}]";
        let entries = parse_batch_entries(text).expect("parses");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "c1");
    }

    #[test]
    fn non_array_text_fails_to_parse() {
        assert!(parse_batch_entries("no array here at all").is_none());
    }
}
