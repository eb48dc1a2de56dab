//! Chat-bot API client
//!
//! Wraps the bot HTTP API used for operator approval:
//! - Sending the update notice with its inline approve/reject keyboard
//! - Long-polling the update feed
//! - Acknowledging callback presses (stops the chat client's spinner)

use crate::error::Result;
use crate::{handle_empty_response, handle_response};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Long-poll timeout passed to the feed endpoint, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the chat-bot API
#[derive(Debug, Clone)]
pub struct BotClient {
    /// Base URL with the bot token embedded
    /// (e.g., "https://api.telegram.org/bot<token>")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

/// One item from the bot's update feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedUnit {
    pub update_id: i64,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// An operator's button press, attached to a feed unit.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub data: Option<String>,
}

/// The user behind a callback press.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    result: Vec<FeedUnit>,
}

impl BotClient {
    /// Create a new bot client
    ///
    /// # Arguments
    /// * `base_url` - Bot API base with the token segment already appended
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Get the base URL of the bot API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one batch of feed units, starting at `offset` when given.
    ///
    /// The call blocks for up to the long-poll timeout and returns a
    /// possibly empty batch. Delivery upstream is at-least-once; callers own
    /// the cursor that makes consumption effectively once.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<FeedUnit>> {
        let url = format!("{}/getUpdates", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("timeout", POLL_TIMEOUT_SECS)]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await?;
        let body: UpdatesResponse = handle_response(response).await?;

        debug!("Feed returned {} unit(s)", body.result.len());
        Ok(body.result)
    }

    /// Sends the update notice with the inline approve/reject keyboard.
    ///
    /// The approve button embeds `{"a":"approve","i":<repo>,"v":<tag>}` as
    /// its callback payload; the reject button's payload is the bare token
    /// `reject`. The decoder on the consuming side tolerates that asymmetry.
    pub async fn send_update_notice(
        &self,
        chat_id: &str,
        text: &str,
        repository: &str,
        version: &str,
    ) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let reply_markup = inline_keyboard(repository, version).to_string();

        let params = [
            ("chat_id", chat_id),
            ("text", text),
            ("reply_markup", reply_markup.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        handle_empty_response(response).await
    }

    /// Acknowledges a callback press.
    pub async fn answer_callback(&self, query_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/answerCallbackQuery", self.base_url);

        let params = [
            ("callback_query_id", query_id),
            ("text", text),
            ("show_alert", "false"),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        handle_empty_response(response).await
    }
}

/// Builds the two-button approve/reject keyboard for an update notice.
fn inline_keyboard(repository: &str, version: &str) -> serde_json::Value {
    let approve_payload = json!({
        "a": "approve",
        "i": repository,
        "v": version,
    })
    .to_string();

    json!({
        "inline_keyboard": [[
            { "text": "✅ Approve", "callback_data": approve_payload },
            { "text": "❌ Reject", "callback_data": "reject" },
        ]]
    })
}
