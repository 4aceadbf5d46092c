use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::debug;

use crate::model::{ActionTarget, Notification};

static CALLBACK_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<action>[a-z]+):(?P<id>[0-9A-Za-z-]+):(?P<mode>[sn])$")
        .expect("valid callback regex")
});

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<()>;
}

/// Sends notifications to one Telegram chat. Action targets become inline
/// keyboard buttons whose callback data addresses the stored record.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        let text = render_text(notification);
        debug!(kind = notification.kind.as_str(), chat = self.chat_id.0, "sending notification");
        let request = self.bot.send_message(self.chat_id, text);
        let sent = match build_keyboard(notification) {
            Some(keyboard) => request.reply_markup(keyboard).await,
            None => request.await,
        };
        sent.context("failed to send Telegram notification")?;
        Ok(())
    }
}

pub fn render_text(notification: &Notification) -> String {
    if notification.detail.is_empty() {
        notification.message.clone()
    } else {
        format!("{}\n\n{}", notification.message, notification.detail)
    }
}

pub fn build_keyboard(notification: &Notification) -> Option<InlineKeyboardMarkup> {
    if notification.targets.is_empty() {
        return None;
    }
    let row: Vec<InlineKeyboardButton> = notification
        .targets
        .iter()
        .map(|t| InlineKeyboardButton::callback(t.label.clone(), encode_callback(t)))
        .collect();
    Some(InlineKeyboardMarkup::new(vec![row]))
}

/// `<action>:<record id>:<s|n>`; `s` marks a silent target. Fits Telegram's
/// 64-byte callback data limit for UUID record ids.
pub fn encode_callback(target: &ActionTarget) -> String {
    let mode = if target.silent { "s" } else { "n" };
    format!("{}:{}:{}", target.id, target.record_id, mode)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData<'a> {
    pub action: &'a str,
    pub record_id: &'a str,
    pub silent: bool,
}

pub fn decode_callback(data: &str) -> Option<CallbackData<'_>> {
    let caps = CALLBACK_DATA.captures(data)?;
    Some(CallbackData {
        action: caps.name("action")?.as_str(),
        record_id: caps.name("id")?.as_str(),
        silent: caps.name("mode")?.as_str() == "s",
    })
}
