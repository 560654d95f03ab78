//! Alert delivery for watch transitions.
//!
//! Pushes a message to the operator's Telegram chat when a watched
//! product comes back in stock or an order changes status. Delivery is
//! fire-and-forget: the dispatcher spawns the send and logs the outcome,
//! so a slow or failing bot API never stalls a check pass.
//!
//! Configuration comes from the environment: `TELEGRAM_BOT_TOKEN` and
//! `TELEGRAM_CHAT_ID` enable the channel, `NOTIFY_DISABLED=true` mutes
//! everything. Without a channel the watcher still runs and transitions
//! show up in the logs only.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod telegram;

pub use error::ChannelError;
pub use events::NotifyEvent;
pub use telegram::TelegramChannel;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

/// Environment variable that mutes all delivery.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// A delivery target for alert messages.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Short channel name for log lines.
    fn name(&self) -> &'static str;

    /// Whether the channel has the configuration it needs to deliver.
    fn enabled(&self) -> bool;

    /// Deliver one event.
    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError>;
}

/// Hands transition events to the configured channel.
///
/// Holds at most one channel and construction never fails: without
/// configuration the notifier drops events and the watcher runs
/// alert-less.
pub struct Notifier {
    channel: Option<Arc<dyn NotifyChannel>>,
}

impl Notifier {
    /// Build from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let muted = std::env::var(ENV_NOTIFY_DISABLED)
            .is_ok_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
        if muted {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self::silent();
        }

        let telegram = TelegramChannel::from_env();
        if telegram.enabled() {
            info!(channel = telegram.name(), "Notification channel ready");
            Self::with_channel(Arc::new(telegram))
        } else {
            Self::silent()
        }
    }

    /// Build around a specific channel.
    #[must_use]
    pub fn with_channel(channel: Arc<dyn NotifyChannel>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// A notifier that drops every event.
    #[must_use]
    pub const fn silent() -> Self {
        Self { channel: None }
    }

    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Deliver an event without waiting for the outcome.
    ///
    /// The send runs on a spawned task. Failures are logged and
    /// swallowed; a lost alert never wedges the caller.
    pub fn notify(&self, event: NotifyEvent) {
        let Some(channel) = &self.channel else {
            debug!(event = %event.title(), "No notification channel, event dropped");
            return;
        };

        let channel = Arc::clone(channel);
        tokio::spawn(async move {
            match channel.send(&event).await {
                Ok(()) => {
                    debug!(
                        channel = channel.name(),
                        event = %event.title(),
                        "Notification sent"
                    );
                }
                Err(e) => {
                    error!(
                        channel = channel.name(),
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        });
    }
}
