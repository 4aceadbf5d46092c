#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_watchbot::db;
use search_watchbot::model::{Cursor, Notification, RemoteItem, StoredRecord, WorkUnit};
use search_watchbot::notify::Notifier;
use search_watchbot::processor::ItemProcessor;
use search_watchbot::search::{SearchPage, SearchQuery, SearchSource};
use search_watchbot::store::{CursorStore, RecordStore, SqliteStore};
use search_watchbot::Worker;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub async fn setup_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(db::memory_pool().await.unwrap()))
}

pub fn unit(name: &str, search: Option<&str>, limit: Option<u32>) -> WorkUnit {
    WorkUnit {
        name: name.into(),
        search: search.map(str::to_string),
        limit,
    }
}

pub fn item(id: &str, text: &str) -> RemoteItem {
    RemoteItem {
        id: id.into(),
        author: format!("user{}", id),
        author_name: None,
        text: text.into(),
        created_at: "Thu, 06 Dec 2012 17:10:42 +0000".into(),
    }
}

pub fn page(items: Vec<RemoteItem>, high_water_mark: Option<&str>) -> SearchPage {
    SearchPage {
        items,
        high_water_mark: high_water_mark.map(str::to_string),
    }
}

pub fn worker(
    store: Arc<SqliteStore>,
    source: ScriptedSource,
    notifier: RecordingNotifier,
) -> Worker {
    let processor = ItemProcessor::new(store.clone(), Arc::new(notifier));
    Worker::new(store, Arc::new(source), processor)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub term: String,
    pub limit: u32,
    pub since: Option<String>,
}

/// Search source returning scripted pages in order; an empty page once the
/// script runs out.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    responses: Arc<Mutex<VecDeque<Result<SearchPage>>>>,
    queries: Arc<Mutex<Vec<RecordedQuery>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn with_responses(responses: Vec<Result<SearchPage>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchSource for ScriptedSource {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<SearchPage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.queries.lock().await.push(RecordedQuery {
            term: query.term.to_string(),
            limit: query.limit,
            since: query.since.map(str::to_string),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Records dispatched notifications in completion order. Fails, hangs or
/// sleeps for notifications whose detail contains the configured marker.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail_when: Option<String>,
    hang_when: Option<String>,
    delays: Vec<(String, Duration)>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_when: Some(marker.into()),
            ..Default::default()
        }
    }

    pub fn hanging_on(marker: &str) -> Self {
        Self {
            hang_when: Some(marker.into()),
            ..Default::default()
        }
    }

    pub fn with_delays(mut self, delays: &[(&str, Duration)]) -> Self {
        self.delays = delays
            .iter()
            .map(|(marker, delay)| (marker.to_string(), *delay))
            .collect();
        self
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .delays
            .iter()
            .find(|(marker, _)| notification.detail.contains(marker.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = &self.hang_when {
            if notification.detail.contains(marker.as_str()) {
                futures::future::pending::<()>().await;
            }
        }
        if let Some(marker) = &self.fail_when {
            if notification.detail.contains(marker.as_str()) {
                return Err(anyhow!("telegram unavailable"));
            }
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Cursor store over SQLite whose reads and/or writes can be made to fail.
pub struct FlakyCursors {
    pub inner: Arc<SqliteStore>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[async_trait]
impl CursorStore for FlakyCursors {
    async fn get(&self, key: &str) -> Result<Option<Cursor>> {
        if self.fail_reads {
            return Err(anyhow!("cursor table locked"));
        }
        CursorStore::get(self.inner.as_ref(), key).await
    }

    async fn set(&self, key: &str, cursor: &Cursor) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("disk full"));
        }
        self.inner.set(key, cursor).await
    }
}

/// Record store over SQLite that rejects items whose text contains a marker.
pub struct RejectingRecords {
    pub inner: Arc<SqliteStore>,
    pub reject_when: String,
}

#[async_trait]
impl RecordStore for RejectingRecords {
    async fn put(
        &self,
        timestamp: DateTime<Utc>,
        item: &RemoteItem,
        visible: bool,
    ) -> Result<String> {
        if item.text.contains(self.reject_when.as_str()) {
            return Err(anyhow!("constraint violation"));
        }
        self.inner.put(timestamp, item, visible).await
    }

    async fn set_visible(&self, id: &str, visible: bool) -> Result<()> {
        self.inner.set_visible(id, visible).await
    }

    async fn list_all(&self) -> Result<Vec<StoredRecord>> {
        self.inner.list_all().await
    }
}

pub async fn cursor_of(store: &SqliteStore, key: &str) -> Option<String> {
    CursorStore::get(store, key)
        .await
        .unwrap()
        .map(|c| c.high_water_id)
}
