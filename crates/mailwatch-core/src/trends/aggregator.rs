//! Windowed aggregation of outbox activity

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use crate::db::{OutboxQuery, OutboxStore};
use crate::error::{Error, Result};
use crate::models::{
    bucket_width, Trends24h, TrendsBucket, TrendsSummary, TrendsWindow, BUCKET_COUNT,
};

/// Builds [`Trends24h`] reports from an outbox store
#[derive(Clone)]
pub struct TrendsAggregator {
    store: Arc<dyn OutboxStore>,
}

impl TrendsAggregator {
    /// Create a new aggregator
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    /// Build the report for the 24 hours ending now
    pub async fn execute(&self) -> Result<Trends24h> {
        self.execute_at(Utc::now()).await
    }

    /// Build the report for the 24 hours ending at `now`
    ///
    /// All four reads must succeed; the first failure aborts the report.
    #[instrument(skip(self))]
    pub async fn execute_at(&self, now: DateTime<Utc>) -> Result<Trends24h> {
        let window_start = window_start_for(now);
        let store = self.store.as_ref();

        let (queued, sent, failed, pending) = tokio::try_join!(
            labelled(OutboxQuery::Queued, store.queued_since(window_start)),
            labelled(OutboxQuery::Sent, store.sent_since(window_start)),
            labelled(OutboxQuery::Failed, store.failed_since(window_start)),
            labelled(OutboxQuery::Pending, store.pending_oldest_first()),
        )?;

        let trends = build_trends(now, &queued, &sent, &failed, &pending);

        debug!(
            total_queued = trends.summary.total_queued,
            total_sent = trends.summary.total_sent,
            total_failed = trends.summary.total_failed,
            current_pending = trends.summary.current_pending,
            success_rate = trends.summary.success_rate_24h,
            "Built outbox trends"
        );

        Ok(trends)
    }
}

async fn labelled<T>(
    query: OutboxQuery,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    fut.await.map_err(|e| Error::query(query, e))
}

/// Fold raw timestamps into a 24-hour report ending at `now`
///
/// `pending` must be ordered oldest first. Timestamps outside
/// `[now - 24h, now)` are left out of the buckets. Within a day of the
/// earliest representable time the window starts at that minimum instead.
pub fn build_trends(
    now: DateTime<Utc>,
    queued: &[DateTime<Utc>],
    sent: &[DateTime<Utc>],
    failed: &[DateTime<Utc>],
    pending: &[DateTime<Utc>],
) -> Trends24h {
    let window_start = window_start_for(now);
    let mut buckets: Vec<TrendsBucket> = (0..BUCKET_COUNT)
        .map(|i| TrendsBucket::empty(window_start + bucket_width() * i as i32))
        .collect();

    for &t in queued {
        if let Some(i) = bucket_index(&buckets, t) {
            buckets[i].queued += 1;
        }
    }
    for &t in sent {
        if let Some(i) = bucket_index(&buckets, t) {
            buckets[i].sent += 1;
        }
    }
    for &t in failed {
        if let Some(i) = bucket_index(&buckets, t) {
            buckets[i].failed += 1;
        }
    }

    let current_pending = pending.len() as u64;
    if let Some(last) = buckets.last_mut() {
        last.pending_snapshot = Some(current_pending);
    }

    let total_queued: u64 = buckets.iter().map(|b| b.queued).sum();
    let total_sent: u64 = buckets.iter().map(|b| b.sent).sum();
    let total_failed: u64 = buckets.iter().map(|b| b.failed).sum();

    Trends24h {
        window: TrendsWindow::Last24h,
        buckets,
        summary: TrendsSummary {
            total_queued,
            total_sent,
            total_failed,
            oldest_pending: pending.first().copied(),
            current_pending,
            success_rate_24h: success_rate(total_sent, total_queued),
        },
    }
}

fn window_start_for(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::hours(24))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Index of the bucket holding `t`, by binary search over bucket starts
fn bucket_index(buckets: &[TrendsBucket], t: DateTime<Utc>) -> Option<usize> {
    let after = buckets.partition_point(|b| b.bucket_start <= t);
    let i = after.checked_sub(1)?;
    buckets[i].contains(t).then_some(i)
}

// Items sent in the window may have been queued before it opened, so the
// ratio is capped at 1.
fn success_rate(sent: u64, queued: u64) -> f64 {
    (sent as f64 / queued.max(1) as f64).min(1.0)
}
