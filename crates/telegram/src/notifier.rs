use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::warn;

use common::{Error, Notifier, Result, TelegramConfig, Urgency};

/// Pushes signals to every allowed operator chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
    enabled: bool,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_ids: Vec<ChatId>, enabled: bool) -> Self {
        Self {
            bot,
            chat_ids,
            enabled,
        }
    }

    /// Disabled unless notifications are switched on and at least one chat is allowed.
    pub fn from_config(bot: Bot, config: &TelegramConfig) -> Self {
        let chat_ids: Vec<ChatId> = config.allowed_user_ids.iter().map(|&id| ChatId(id)).collect();
        let enabled = config.notify_enabled && !chat_ids.is_empty();
        if config.notify_enabled && chat_ids.is_empty() {
            warn!("Telegram notifications enabled but TELEGRAM_ALLOWED_USER_IDS is empty");
        }
        Self::new(bot, chat_ids, enabled)
    }
}

fn render(title: &str, body: &str, urgency: Urgency) -> String {
    let marker = match urgency {
        Urgency::High => "\u{203c}\u{fe0f} ",
        Urgency::Medium | Urgency::Low => "",
    };
    format!("{marker}{title}\n\n{body}")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, title: &str, body: &str, urgency: Urgency) -> Result<()> {
        let text = render(title, body, urgency);
        let mut failed = Vec::new();
        for &chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(chat_id, text.clone()).await {
                warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram message");
                failed.push(chat_id.0.to_string());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Notify(format!(
                "telegram delivery failed for chat(s) {}",
                failed.join(", ")
            )))
        }
    }
}
