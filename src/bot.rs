//! Telegram update handling: inline-button callbacks and a few chat commands.
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, instrument, warn};

use crate::handlers::{self, StatusProbe};
use crate::model::StoredRecord;
use crate::notify::decode_callback;
use crate::store::RecordStore;

/// How many visible records `/feed` lists in chat.
const FEED_PREVIEW: usize = 5;

#[derive(Clone)]
pub struct BotState {
    pub records: Arc<dyn RecordStore>,
    pub status: StatusProbe,
    /// Empty means everyone may use chat commands.
    pub allowed_users: Vec<i64>,
}

impl BotState {
    fn is_allowed(&self, user_id: Option<i64>) -> bool {
        self.allowed_users.is_empty()
            || user_id.is_some_and(|id| self.allowed_users.contains(&id))
    }
}

pub async fn run_dispatcher(bot: Bot, state: BotState) {
    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(on_callback))
        .branch(Update::filter_message().endpoint(on_message));

    info!("starting telegram dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[instrument(skip_all)]
async fn on_callback(bot: Bot, q: CallbackQuery, state: BotState) -> ResponseResult<()> {
    if !state.is_allowed(Some(q.from.id.0 as i64)) {
        bot.answer_callback_query(q.id).text("Not allowed.").await?;
        return Ok(());
    }

    let decoded = q.data.as_deref().and_then(decode_callback);
    let silent = decoded.as_ref().map_or(true, |d| d.silent);
    let reply = handlers::handle_callback(
        state.records.as_ref(),
        decoded.as_ref().map(|d| d.action),
        decoded.as_ref().map(|d| d.record_id),
    )
    .await;

    let text = match reply {
        Ok(reply) => reply.message.to_string(),
        Err(err) => {
            warn!(%err, data = q.data.as_deref().unwrap_or("-"), "callback failed");
            err.to_string()
        }
    };

    bot.answer_callback_query(q.id.clone()).text(text.clone()).await?;
    if !silent {
        if let Some(message) = &q.message {
            bot.send_message(message.chat.id, text).await?;
        }
    }
    Ok(())
}

#[instrument(skip_all)]
async fn on_message(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !state.is_allowed(msg.from().map(|u| u.id.0 as i64)) {
        return Ok(());
    }

    match text.trim() {
        "/ping" => {
            bot.send_message(msg.chat.id, "PONG").await?;
        }
        "/status" => {
            let report = state.status.status();
            bot.send_message(msg.chat.id, format!("status: {}", report.status))
                .await?;
        }
        "/feed" => {
            let reply = match handlers::handle_feed(state.records.as_ref()).await {
                Ok(page) => render_feed(&page.data),
                Err(err) => {
                    warn!(%err, "feed request failed");
                    err.to_string()
                }
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
        _ => {}
    }
    Ok(())
}

fn render_feed(records: &[StoredRecord]) -> String {
    let visible: Vec<&StoredRecord> = records.iter().filter(|r| r.visible).collect();
    if visible.is_empty() {
        return format!("Feed is empty ({} stored).", records.len());
    }
    let mut out = format!("Feed: {} visible of {} stored", visible.len(), records.len());
    for record in visible.iter().rev().take(FEED_PREVIEW) {
        out.push_str(&format!(
            "\n\n{} ({}):\n{}",
            record.item.display_author(),
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.item.text
        ));
    }
    out
}
