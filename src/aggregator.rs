//! Batch completion tracking: waits for every item outcome, then classifies.
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::processor::ProcessOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub observed: usize,
    pub succeeded: usize,
}

impl BatchSummary {
    /// Succeeded iff every submitted item was observed and succeeded.
    pub fn verdict(&self) -> Verdict {
        if self.observed == self.total && self.succeeded == self.total {
            Verdict::Succeeded
        } else {
            Verdict::Failed
        }
    }
}

#[derive(Debug)]
pub struct CompletionAggregator {
    total: usize,
    observed: usize,
    succeeded: usize,
}

impl CompletionAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            observed: 0,
            succeeded: 0,
        }
    }

    pub fn record(&mut self, outcome: &ProcessOutcome) {
        self.observed += 1;
        if outcome.success {
            self.succeeded += 1;
        } else if let Some(err) = &outcome.error {
            warn!(
                %err,
                storage_id = outcome.storage_id.as_deref().unwrap_or("-"),
                "item failed"
            );
        }
        debug!(observed = self.observed, total = self.total, "item settled");
    }

    pub fn is_settled(&self) -> bool {
        self.observed >= self.total
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            observed: self.observed,
            succeeded: self.succeeded,
        }
    }

    /// Drain `outcomes` to the end. A failed item never short-circuits the
    /// batch: in-flight siblings keep running until they settle. Counts are
    /// kept on `self`, so a caller that drops this future early can still
    /// read a partial `summary()`.
    pub async fn collect<S>(&mut self, outcomes: S) -> BatchSummary
    where
        S: Stream<Item = ProcessOutcome>,
    {
        let mut outcomes = std::pin::pin!(outcomes);
        while let Some(outcome) = outcomes.next().await {
            self.record(&outcome);
        }
        if !self.is_settled() {
            warn!(
                observed = self.observed,
                total = self.total,
                "outcome stream ended before every item settled"
            );
        }
        self.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use futures::stream::{self, FuturesUnordered};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ok() -> ProcessOutcome {
        ProcessOutcome {
            success: true,
            storage_id: Some("id".into()),
            error: None,
        }
    }

    fn failed() -> ProcessOutcome {
        ProcessOutcome {
            success: false,
            storage_id: None,
            error: Some(RunError::Storage("boom".into())),
        }
    }

    #[tokio::test]
    async fn all_success_succeeds() {
        let summary = CompletionAggregator::new(3)
            .collect(stream::iter(vec![ok(), ok(), ok()]))
            .await;
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.verdict(), Verdict::Succeeded);
    }

    #[tokio::test]
    async fn any_failure_fails() {
        let summary = CompletionAggregator::new(3)
            .collect(stream::iter(vec![ok(), failed(), ok()]))
            .await;
        assert_eq!(summary.observed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.verdict(), Verdict::Failed);
    }

    #[tokio::test]
    async fn short_stream_fails() {
        let summary = CompletionAggregator::new(3)
            .collect(stream::iter(vec![ok(), ok()]))
            .await;
        assert_eq!(summary.verdict(), Verdict::Failed);
    }

    #[tokio::test]
    async fn waits_for_slow_items_after_early_failure() {
        let finished = Arc::new(AtomicUsize::new(0));
        let tasks: FuturesUnordered<_> = (0..4u64)
            .map(|i| {
                let finished = finished.clone();
                async move {
                    if i == 0 {
                        return failed();
                    }
                    tokio::time::sleep(Duration::from_millis(10 * i)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    ok()
                }
            })
            .collect();

        let summary = CompletionAggregator::new(4).collect(tasks).await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(summary.observed, 4);
        assert_eq!(summary.verdict(), Verdict::Failed);
    }

    #[tokio::test]
    async fn dropped_collect_keeps_partial_counts() {
        let tasks: FuturesUnordered<_> = (0..3u64)
            .map(|i| async move {
                if i == 2 {
                    futures::future::pending::<()>().await;
                }
                ok()
            })
            .collect();

        let mut agg = CompletionAggregator::new(3);
        let res = tokio::time::timeout(Duration::from_millis(20), agg.collect(tasks)).await;
        assert!(res.is_err());
        let summary = agg.summary();
        assert_eq!(summary.observed, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.verdict(), Verdict::Failed);
    }

    #[test]
    fn empty_batch_is_trivially_settled() {
        let agg = CompletionAggregator::new(0);
        assert!(agg.is_settled());
        assert_eq!(agg.summary().verdict(), Verdict::Succeeded);
    }
}
