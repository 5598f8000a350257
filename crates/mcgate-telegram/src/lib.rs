// # Telegram Transport
//
// Telegram Bot API implementation of the chat transport:
//
// - [`TelegramUpdateSource`]: long-polls `getUpdates` and yields decoded
//   [`Inbound`] updates from private chats
// - [`TelegramNotifier`]: `sendMessage` with an inline keyboard built from
//   the message's actions
//
// ## Trust Level: Semi-Trusted (network transport)
//
// **Allowed Capabilities**:
// - ✅ HTTPS calls to the Bot API only
// - ✅ One polling task per `watch()`
//
// **Forbidden Capabilities**:
// - ❌ Interpret commands (decoding into `Command` is all it does)
// - ❌ Access the account store
//
// ## Security Requirements
//
// - The bot token is part of every request URL; it NEVER appears in logs
//   or error messages (reqwest errors are stripped of their URL)
// - Callback payloads are decoded into the closed `Command` set and dropped
//   when they don't decode
//
// ## API Reference
//
// - https://core.telegram.org/bots/api#getupdates
// - https://core.telegram.org/bots/api#sendmessage
// - https://core.telegram.org/bots/api#answercallbackquery

mod api;

use async_trait::async_trait;
use mcgate_core::traits::{AccountId, Inbound, Notifier, OutboundMessage, UpdateSource};
use mcgate_core::{Error, Result};
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

pub use api::{decode_update, inline_keyboard, CallbackQuery, Chat, Message, Update, User};

/// Bot API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default long-poll timeout (seconds the server may hold `getUpdates`)
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Slack on top of the long-poll timeout for the HTTP request itself
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Thin Bot API client shared by the update source and the notifier
///
/// # Security
///
/// The Debug implementation does NOT expose the bot token.
#[derive(Clone)]
pub struct TelegramClient {
    /// ⚠️ NEVER log this value
    token: String,
    api_base: String,
    poll_timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl TelegramClient {
    /// Create a client
    ///
    /// # Parameters
    ///
    /// - `token`: bot token issued by @BotFather
    /// - `poll_timeout_secs`: long-poll timeout for `getUpdates`
    pub fn new(token: impl Into<String>, poll_timeout_secs: u64) -> Result<Self> {
        Self::with_api_base(token, poll_timeout_secs, TELEGRAM_API_BASE)
    }

    /// Create a client against another Bot API server (self-hosted or a test double)
    pub fn with_api_base(
        token: impl Into<String>,
        poll_timeout_secs: u64,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("Telegram bot token cannot be empty"));
        }

        let poll_timeout = Duration::from_secs(poll_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {}", e.without_url())))?;

        Ok(Self {
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            poll_timeout,
            client,
        })
    }

    /// Call a Bot API method and return its `result`
    pub async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::transport(format!("{method} request failed: {}", e.without_url())))?;

        let status = response.status();
        let envelope: api::Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("{method}: unreadable response ({status}): {}", e.without_url())))?;

        envelope.into_result(method, status.as_u16())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}

/// Inbound updates via `getUpdates` long polling
#[derive(Debug, Clone)]
pub struct TelegramUpdateSource {
    client: Arc<TelegramClient>,
}

impl TelegramUpdateSource {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

impl UpdateSource for TelegramUpdateSource {
    /// Spawn the polling task and return its stream
    ///
    /// The task ends once the stream is dropped (noticed after the current poll).
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Inbound> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();

        tokio::spawn(async move {
            info!(poll_timeout = ?client.poll_timeout, "Starting Telegram long polling");
            let mut offset = 0i64;

            loop {
                let updates = match client.get_updates(offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!(error = %e, "getUpdates failed, retrying in {:?}", POLL_ERROR_BACKOFF);
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        if tx.is_closed() {
                            break;
                        }
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);

                    if let Some(callback) = &update.callback_query
                        && let Err(e) = client.answer_callback(&callback.id).await
                    {
                        debug!(error = %e, "answerCallbackQuery failed");
                    }

                    let Some(inbound) = decode_update(&update) else {
                        continue;
                    };
                    if tx.send(inbound).is_err() {
                        debug!("Update stream dropped, stopping Telegram polling");
                        return;
                    }
                }

                if tx.is_closed() {
                    break;
                }
            }
            debug!("Telegram polling stopped");
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// Outbound messages via `sendMessage`
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, to: AccountId, message: &OutboundMessage) -> Result<()> {
        let mut body = json!({
            "chat_id": to,
            "text": message.text,
        });
        if !message.actions.is_empty() {
            body["reply_markup"] = inline_keyboard(&message.actions);
        }

        let _: Message = self.client.call("sendMessage", &body).await?;
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "telegram"
    }
}
