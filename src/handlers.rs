//! Thin inbound handlers over the storage and notification collaborators.
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::RunError;
use crate::model::{Notification, StoredRecord, VisibilityAction};
use crate::notify::Notifier;
use crate::store::RecordStore;

/// Process-wide health flag, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct StatusProbe {
    healthy: bool,
}

impl StatusProbe {
    pub const fn new(healthy: bool) -> Self {
        Self { healthy }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            status: if self.healthy { "ok" } else { "error" },
        }
    }
}

impl Default for StatusProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallbackReply {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub data: Vec<StoredRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookReply {
    pub result: &'static str,
}

/// Show or hide a stored record in the feed.
#[instrument(skip_all, fields(action = action.unwrap_or("-")))]
pub async fn handle_callback(
    records: &dyn RecordStore,
    action: Option<&str>,
    record_id: Option<&str>,
) -> Result<CallbackReply, RunError> {
    let action = action.map(str::trim).filter(|a| !a.is_empty());
    let record_id = record_id.map(str::trim).filter(|id| !id.is_empty());
    let (Some(action), Some(record_id)) = (action, record_id) else {
        return Err(RunError::Validation("missing info"));
    };
    let action =
        VisibilityAction::parse_action(action).ok_or(RunError::Validation("unknown action"))?;

    info!(record_id, "handling callback action");
    records
        .set_visible(record_id, action.visible())
        .await
        .map_err(|err| {
            warn!(?err, record_id, "failed to update visibility");
            RunError::storage(&err)
        })?;

    Ok(CallbackReply {
        message: match action {
            VisibilityAction::Show => "Added to feed",
            VisibilityAction::Hide => "Removed from feed",
        },
    })
}

/// All stored records verbatim; visibility filtering is left to the consumer.
#[instrument(skip_all)]
pub async fn handle_feed(records: &dyn RecordStore) -> Result<FeedPage, RunError> {
    info!("feed request");
    let data = records.list_all().await.map_err(|err| RunError::storage(&err))?;
    Ok(FeedPage { data })
}

/// Forward an arbitrary payload as one alert notification.
#[instrument(skip_all)]
pub async fn handle_webhook(
    notifier: &dyn Notifier,
    payload: &Value,
) -> Result<WebhookReply, RunError> {
    let notification = webhook_alert(payload);
    notifier
        .dispatch(&notification)
        .await
        .map_err(|err| RunError::notify(&err))?;
    Ok(WebhookReply { result: "sent" })
}

pub fn webhook_alert(payload: &Value) -> Notification {
    let message = match payload.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Notification::alert(
        "Search hook called",
        format!("Search hook called: {}", message),
    )
}
