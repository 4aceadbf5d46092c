//! Per-item pipeline: resolve timestamp, store, notify.
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::RunError;
use crate::model::{ActionTarget, Notification, NotificationKind, RemoteItem, VisibilityAction, WorkUnit};
use crate::notify::Notifier;
use crate::store::RecordStore;

#[derive(Debug)]
pub struct ProcessOutcome {
    pub success: bool,
    /// Set once storage succeeded, even if dispatch later failed.
    pub storage_id: Option<String>,
    pub error: Option<RunError>,
}

impl ProcessOutcome {
    fn stored(storage_id: String) -> Self {
        Self {
            success: true,
            storage_id: Some(storage_id),
            error: None,
        }
    }

    fn failed(storage_id: Option<String>, error: RunError) -> Self {
        Self {
            success: false,
            storage_id,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct ItemProcessor {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl ItemProcessor {
    pub fn new(records: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { records, notifier }
    }

    #[instrument(skip_all, fields(work_unit = %unit.name, remote_id = %item.id))]
    pub async fn process(&self, unit: &WorkUnit, item: &RemoteItem) -> ProcessOutcome {
        let timestamp = resolve_timestamp(&item.created_at, Utc::now());

        let storage_id = match self.records.put(timestamp, item, true).await {
            Ok(id) => id,
            Err(err) => {
                warn!(?err, "failed to store item");
                return ProcessOutcome::failed(None, RunError::storage(&err));
            }
        };

        let notification = build_notification(unit, item, &storage_id);
        if let Err(err) = self.notifier.dispatch(&notification).await {
            // The record stays stored; the batch verdict carries the failure.
            warn!(?err, record_id = %storage_id, "failed to dispatch notification");
            return ProcessOutcome::failed(Some(storage_id), RunError::notify(&err));
        }

        ProcessOutcome::stored(storage_id)
    }
}

/// Parse the API's creation time, falling back to `now` when it is unparsable.
pub fn resolve_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        // Legacy timeline format, e.g. "Wed Aug 27 13:08:45 +0000 2008".
        .or_else(|_| DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y"))
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or(now)
}

pub fn build_notification(unit: &WorkUnit, item: &RemoteItem, record_id: &str) -> Notification {
    Notification {
        kind: NotificationKind::Action,
        message: format!("{} match", unit.name),
        detail: format!("{} said:\n{}", item.display_author(), item.text),
        targets: vec![
            ActionTarget::visibility(VisibilityAction::Show, record_id),
            ActionTarget::visibility(VisibilityAction::Hide, record_id),
        ],
    }
}
