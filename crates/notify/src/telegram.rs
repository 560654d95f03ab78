//! Telegram bot notification channel.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Environment variable for the bot token.
const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable for the target chat.
const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Telegram bot notification channel.
///
/// Delivers event messages via the Bot API `sendMessage` call.
pub struct TelegramChannel {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let bot_token = std::env::var(ENV_TELEGRAM_BOT_TOKEN).ok();
        let chat_id = std::env::var(ENV_TELEGRAM_CHAT_ID).ok();

        if bot_token.is_some() && chat_id.is_some() {
            debug!("Telegram notifications enabled");
        } else {
            debug!(
                "Telegram notifications disabled (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set)"
            );
        }

        Self {
            bot_token,
            chat_id,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: build_client(),
        }
    }

    /// Create a Telegram channel with a specific token and chat.
    #[must_use]
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token: Some(bot_token),
            chat_id: Some(chat_id),
            api_base: TELEGRAM_API_BASE.to_string(),
            client: build_client(),
        }
    }

    /// Point the channel at an alternate API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let bot_token = self
            .bot_token
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_TELEGRAM_BOT_TOKEN.to_string()))?;
        let chat_id = self
            .chat_id
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_TELEGRAM_CHAT_ID.to_string()))?;

        let text = event.message();

        debug!(channel = "telegram", event = %event.title(), "Sending notification");

        let url = format!("{}/bot{bot_token}/sendMessage", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("chat_id", chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await?;

        if response.status().is_success() {
            debug!(channel = "telegram", "Notification sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "telegram",
                status = %status,
                body = %body,
                "Telegram sendMessage failed"
            );

            Err(ChannelError::Other(format!(
                "Telegram returned {status}: {body}"
            )))
        }
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
