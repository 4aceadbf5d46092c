//! Run orchestration: load cursor, fetch, fan out, aggregate, advance cursor.
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::aggregator::{BatchSummary, CompletionAggregator, Verdict};
use crate::config::Config;
use crate::error::RunError;
use crate::model::{Cursor, RemoteItem, WorkUnit};
use crate::notify::Notifier;
use crate::processor::ItemProcessor;
use crate::search::{SearchClient, SearchQuery, SearchSource, DEFAULT_PAGE_SIZE};
use crate::store::{CursorStore, SqliteStore};

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed(RunError),
}

#[derive(Debug)]
pub struct RunResult {
    pub succeeded: usize,
    pub total: usize,
    pub cursor_advanced: bool,
    pub outcome: RunOutcome,
}

impl RunResult {
    fn completed(total: usize, cursor_advanced: bool) -> Self {
        Self {
            succeeded: total,
            total,
            cursor_advanced,
            outcome: RunOutcome::Completed,
        }
    }

    fn failed(succeeded: usize, total: usize, err: RunError) -> Self {
        Self {
            succeeded,
            total,
            cursor_advanced: false,
            outcome: RunOutcome::Failed(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn error(&self) -> Option<&RunError> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed(err) => Some(err),
        }
    }

    /// The all-or-nothing completion payload handed back to the scheduler.
    pub fn completion(&self) -> Result<Value, &RunError> {
        match &self.outcome {
            RunOutcome::Completed => Ok(json!({ "result": "run completed" })),
            RunOutcome::Failed(err) => Err(err),
        }
    }
}

pub struct Worker {
    cursors: Arc<dyn CursorStore>,
    source: Arc<dyn SearchSource>,
    processor: ItemProcessor,
    batch_timeout: Option<Duration>,
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Worker {
    pub fn new(
        cursors: Arc<dyn CursorStore>,
        source: Arc<dyn SearchSource>,
        processor: ItemProcessor,
    ) -> Self {
        Self {
            cursors,
            source,
            processor,
            batch_timeout: None,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire a worker over the SQLite store and the configured search API.
    pub fn from_config(
        cfg: &Config,
        store: Arc<SqliteStore>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let source = SearchClient::from_config(&cfg.search)?;
        let processor = ItemProcessor::new(store.clone(), notifier);
        Ok(Self::new(store, Arc::new(source), processor).with_batch_timeout(cfg.batch_timeout()))
    }

    /// Fail a run whose items have not all settled within `timeout`.
    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Run one work unit end to end. Never fails outright: every error path
    /// is reported through the returned `RunResult`.
    #[instrument(skip_all, fields(work_unit = %unit.name))]
    pub async fn run_once(&self, unit: &WorkUnit) -> RunResult {
        let Some(term) = unit.search_term() else {
            info!("no search term configured; nothing to do");
            return RunResult::completed(0, false);
        };

        // One run per work unit at a time; other units proceed independently.
        let lock = self.run_lock(unit.key()).await;
        let _guard = lock.lock().await;

        info!("doing work");
        let cursor = match self.cursors.get(unit.key()).await {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(?err, "failed to read cursor");
                return RunResult::failed(0, 0, RunError::cursor_read(&err));
            }
        };

        let query = SearchQuery {
            term,
            limit: unit.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            since: cursor.as_ref().map(|c| c.high_water_id.as_str()),
        };
        info!(term, limit = query.limit, since = ?query.since, "fetching");
        let page = match self.source.search(&query).await {
            Ok(page) => page,
            Err(err) => {
                warn!(?err, "fetch failed");
                return RunResult::failed(0, 0, RunError::fetch(&err));
            }
        };

        let total = page.items.len();
        if total == 0 {
            info!("no new items");
            return RunResult::completed(0, false);
        }
        // A non-empty batch must carry the mark the cursor advances to.
        let Some(high_water_mark) = page.high_water_mark else {
            warn!(count = total, "response carried items but no high-water-mark");
            let err = RunError::Fetch("response carried items but no high-water-mark".into());
            return RunResult::failed(0, total, err);
        };
        info!(count = total, "got new items");

        let (summary, timed_out) = self.process_batch(unit, &page.items).await;
        if let Some(err) = timed_out {
            warn!(%err, succeeded = summary.succeeded, total, "batch abandoned");
            return RunResult::failed(summary.succeeded, total, err);
        }
        if summary.verdict() != Verdict::Succeeded {
            warn!(
                succeeded = summary.succeeded,
                total, "run did not complete successfully"
            );
            return RunResult::failed(summary.succeeded, total, RunError::Incomplete);
        }

        let next = Cursor::new(high_water_mark);
        if let Err(err) = self.cursors.set(unit.key(), &next).await {
            warn!(?err, "failed to persist cursor after a complete batch");
            return RunResult::failed(total, total, RunError::cursor_write(&err));
        }

        info!(cursor = %next.high_water_id, "run completed");
        RunResult::completed(total, true)
    }

    /// Run every unit concurrently; results keep the input order.
    pub async fn run_all(&self, units: &[WorkUnit]) -> Vec<RunResult> {
        join_all(units.iter().map(|unit| self.run_once(unit))).await
    }

    /// Process every item concurrently. On timeout the summary holds the
    /// outcomes observed so far.
    async fn process_batch(
        &self,
        unit: &WorkUnit,
        items: &[RemoteItem],
    ) -> (BatchSummary, Option<RunError>) {
        let outcomes: FuturesUnordered<_> = items
            .iter()
            .map(|item| self.processor.process(unit, item))
            .collect();
        let mut aggregator = CompletionAggregator::new(items.len());
        let timed_out = match self.batch_timeout {
            Some(limit) => tokio::time::timeout(limit, aggregator.collect(outcomes))
                .await
                .err()
                .map(|_| RunError::Timeout(limit)),
            None => {
                aggregator.collect(outcomes).await;
                None
            }
        };
        (aggregator.summary(), timed_out)
    }

    async fn run_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}
