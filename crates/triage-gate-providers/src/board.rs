// crates/triage-gate-providers/src/board.rs
// ============================================================================
// Module: HTTP Board Client
// Description: Typed wrapper over the Kanban board provider's REST API.
// Purpose: Fetch cards and apply priority labels, comments and moves.
// Dependencies: triage-gate-core, reqwest
// ============================================================================

//! ## Overview
//! The board provider is reached over plain HTTP with `key`/`token` query
//! parameters, no redirects, and bounded timeouts. This module owns the
//! label-uniqueness invariant (§4.3): before attaching a new priority label
//! it removes every label already on the card whose name is one of the three
//! priority names, so a card never carries more than one at a time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use triage_gate_core::BoardClient;
use triage_gate_core::BoardClientError;
use triage_gate_core::Card;
use triage_gate_core::Criticality;
use triage_gate_core::ExternalCardId;

/// Prefix prepended to every comment this agent posts.
const AGENT_COMMENT_PREFIX: &str = "[TALAN AGENT \u{1f916}] ";

/// Diagnostic body length retained on a non-2xx response.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`HttpBoardClient`].
///
/// # Invariants
/// - `base_url` carries no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardClientConfig {
    /// Board provider REST base URL.
    pub base_url: String,
    /// Provider API key, shared across all boards.
    pub api_key: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Hard cap on response bodies, in bytes.
    pub max_response_bytes: u64,
}

impl Default for BoardClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.trello.com/1".to_string(),
            api_key: String::new(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 15_000,
            max_response_bytes: 2 * 1024 * 1024,
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP-backed [`BoardClient`].
///
/// # Invariants
/// - Every request carries `key` and `token`; no retries are attempted on a
///   non-2xx response, the caller observes the classified error directly.
pub struct HttpBoardClient {
    /// Client configuration, including limits and the shared API key.
    config: BoardClientConfig,
    /// Per-config board credential, distinct from the process-wide API key.
    token: String,
    /// HTTP client configured with timeouts and no redirects.
    client: Client,
}

impl HttpBoardClient {
    /// Builds a new board client bound to one provider token.
    ///
    /// # Errors
    ///
    /// Returns [`BoardClientError`] if the HTTP client cannot be built.
    pub fn new(config: BoardClientConfig, token: String) -> Result<Self, BoardClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|err| BoardClientError::Transport(err.to_string()))?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// Base query parameters every request carries.
    fn auth_params(&self) -> [(&'static str, &str); 2] {
        [("key", self.config.api_key.as_str()), ("token", self.token.as_str())]
    }

    /// Sends `request`, enforcing the response-size cap and status checking.
    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BoardClientError> {
        let response = request
            .send()
            .await
            .map_err(|err| BoardClientError::Transport(err.to_string()))?;
        if let Some(len) = response.content_length() {
            if len > self.config.max_response_bytes {
                return Err(BoardClientError::InvalidResponse(format!(
                    "response body of {len} bytes exceeds the {} byte cap",
                    self.config.max_response_bytes
                )));
            }
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(BoardClientError::Status {
                status,
                body: truncated,
            });
        }
        Ok(response)
    }

    /// Finds the id of the board-level label named `name`, if any.
    async fn find_board_label_id(&self, board_id: &str, name: &str) -> Result<Option<String>, BoardClientError> {
        let url = format!("{}/boards/{board_id}/labels", self.config.base_url);
        let response = self
            .send_checked(self.client.get(url).query(&self.auth_params()))
            .await?;
        let labels: Vec<TrelloLabelWire> = response
            .json()
            .await
            .map_err(|err| BoardClientError::InvalidResponse(err.to_string()))?;
        Ok(labels.into_iter().find(|label| label.name.as_deref() == Some(name)).map(|label| label.id))
    }

    /// Creates a board-level label named `name` with `color`.
    async fn create_board_label(&self, board_id: &str, name: &str, color: &str) -> Result<String, BoardClientError> {
        let url = format!("{}/labels", self.config.base_url);
        let mut params = self.auth_params().to_vec();
        params.push(("name", name));
        params.push(("color", color));
        params.push(("idBoard", board_id));
        let response = self.send_checked(self.client.post(url).query(&params)).await?;
        let label: TrelloLabelWire = response
            .json()
            .await
            .map_err(|err| BoardClientError::InvalidResponse(err.to_string()))?;
        Ok(label.id)
    }
}

#[async_trait]
impl BoardClient for HttpBoardClient {
    async fn get_list_cards(&self, list_id: &str) -> Result<Vec<Card>, BoardClientError> {
        let url = format!("{}/lists/{list_id}/cards", self.config.base_url);
        let mut params = self.auth_params().to_vec();
        params.push(("fields", "id,name,desc,due,url,labels,idMembers"));
        let response = self.send_checked(self.client.get(url).query(&params)).await?;
        let cards: Vec<TrelloCardWire> = response
            .json()
            .await
            .map_err(|err| BoardClientError::InvalidResponse(err.to_string()))?;
        Ok(cards.into_iter().map(TrelloCardWire::into_card).collect())
    }

    async fn add_label(&self, card_id: &str, board_id: &str, level: Criticality) -> Result<(), BoardClientError> {
        let url = format!("{}/cards/{card_id}", self.config.base_url);
        let mut params = self.auth_params().to_vec();
        params.push(("fields", "labels"));
        let response = self.send_checked(self.client.get(url).query(&params)).await?;
        let current: CardLabelsWire = response
            .json()
            .await
            .map_err(|err| BoardClientError::InvalidResponse(err.to_string()))?;
        for label in current.labels {
            if is_priority_label_name(label.name.as_deref()) {
                let delete_url = format!("{}/cards/{card_id}/idLabels/{}", self.config.base_url, label.id);
                self.send_checked(self.client.delete(delete_url).query(&self.auth_params())).await?;
            }
        }

        let target_name = priority_label_name(level);
        let label_id = match self.find_board_label_id(board_id, target_name).await? {
            Some(id) => id,
            None => self.create_board_label(board_id, target_name, priority_label_color(level)).await?,
        };
        let attach_url = format!("{}/cards/{card_id}/idLabels", self.config.base_url);
        let mut attach_params = self.auth_params().to_vec();
        attach_params.push(("value", label_id.as_str()));
        self.send_checked(self.client.post(attach_url).query(&attach_params)).await?;
        Ok(())
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardClientError> {
        let url = format!("{}/cards/{card_id}/actions/comments", self.config.base_url);
        let comment = format!("{AGENT_COMMENT_PREFIX}{text}");
        let mut params = self.auth_params().to_vec();
        params.push(("text", comment.as_str()));
        self.send_checked(self.client.post(url).query(&params)).await?;
        Ok(())
    }

    async fn move_card(&self, card_id: &str, new_list_id: &str) -> Result<(), BoardClientError> {
        let url = format!("{}/cards/{card_id}/idList", self.config.base_url);
        let mut params = self.auth_params().to_vec();
        params.push(("value", new_list_id));
        self.send_checked(self.client.put(url).query(&params)).await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// One label as returned by the board provider.
#[derive(Debug, Clone, Deserialize)]
struct TrelloLabelWire {
    id: String,
    name: Option<String>,
}

/// The subset of a card's fields needed to inspect its current labels.
#[derive(Debug, Clone, Deserialize)]
struct CardLabelsWire {
    labels: Vec<TrelloLabelWire>,
}

/// One card as returned by `GET /lists/{id}/cards`.
#[derive(Debug, Clone, Deserialize)]
struct TrelloCardWire {
    id: String,
    name: String,
    desc: String,
    due: Option<String>,
    url: String,
    labels: Vec<TrelloLabelWire>,
    #[serde(rename = "idMembers")]
    id_members: Vec<String>,
}

impl TrelloCardWire {
    /// Maps the provider wire shape onto the provider-agnostic [`Card`].
    fn into_card(self) -> Card {
        Card {
            id: ExternalCardId::from(self.id),
            name: self.name,
            desc: self.desc,
            due: self.due,
            url: self.url,
            labels: self.labels.into_iter().filter_map(|label| label.name).collect(),
            members: self.id_members,
        }
    }
}

/// Returns the fixed priority label name for `level`.
fn priority_label_name(level: Criticality) -> &'static str {
    match level {
        Criticality::High => "Priority - High",
        Criticality::Medium => "Priority - Medium",
        Criticality::Low => "Priority - Low",
    }
}

/// Returns the fixed label color for `level` (§9: not configurable).
fn priority_label_color(level: Criticality) -> &'static str {
    match level {
        Criticality::High => "red",
        Criticality::Medium => "orange",
        Criticality::Low => "green",
    }
}

/// Returns whether `name` is one of the three priority label names.
fn is_priority_label_name(name: Option<&str>) -> bool {
    matches!(name, Some("Priority - High" | "Priority - Medium" | "Priority - Low"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::is_priority_label_name;
    use super::priority_label_color;
    use super::priority_label_name;
    use triage_gate_core::Criticality;

    #[test]
    fn priority_label_names_are_fixed() {
        assert_eq!(priority_label_name(Criticality::High), "Priority - High");
        assert_eq!(priority_label_name(Criticality::Medium), "Priority - Medium");
        assert_eq!(priority_label_name(Criticality::Low), "Priority - Low");
    }

    #[test]
    fn priority_label_colors_match_the_fixed_mapping() {
        assert_eq!(priority_label_color(Criticality::High), "red");
        assert_eq!(priority_label_color(Criticality::Medium), "orange");
        assert_eq!(priority_label_color(Criticality::Low), "green");
    }

    #[test]
    fn only_priority_names_are_flagged_for_removal() {
        assert!(is_priority_label_name(Some("Priority - High")));
        assert!(!is_priority_label_name(Some("Blocked")));
        assert!(!is_priority_label_name(None));
    }
}
