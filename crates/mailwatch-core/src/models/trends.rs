//! Trend report data models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of hourly buckets in a trend report
pub const BUCKET_COUNT: usize = 24;

/// Width of a single bucket
pub fn bucket_width() -> Duration {
    Duration::hours(1)
}

/// Time window covered by a trend report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrendsWindow {
    /// The trailing 24 hours
    #[default]
    #[serde(rename = "24h")]
    Last24h,
}

/// Message counts for one hour, `[bucket_start, bucket_start + 1h)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendsBucket {
    /// Inclusive start of the bucket
    pub bucket_start: DateTime<Utc>,

    /// Items queued in this hour
    pub queued: u64,

    /// Items delivered in this hour
    pub sent: u64,

    /// Items that failed in this hour
    pub failed: u64,

    /// Pending backlog observed for this hour, when known
    pub pending_snapshot: Option<u64>,
}

impl TrendsBucket {
    /// Create an empty bucket
    pub fn empty(bucket_start: DateTime<Utc>) -> Self {
        Self {
            bucket_start,
            queued: 0,
            sent: 0,
            failed: 0,
            pending_snapshot: None,
        }
    }

    /// Exclusive end of the bucket
    pub fn end(&self) -> DateTime<Utc> {
        self.bucket_start + bucket_width()
    }

    /// Whether `t` falls inside this bucket
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.bucket_start <= t && t < self.end()
    }
}

/// Rollup over all buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsSummary {
    /// Total items queued in the window
    pub total_queued: u64,

    /// Total items delivered in the window
    pub total_sent: u64,

    /// Total items failed in the window
    pub total_failed: u64,

    /// Creation time of the oldest item still pending
    pub oldest_pending: Option<DateTime<Utc>>,

    /// Items pending right now
    pub current_pending: u64,

    /// Delivered over queued, in `[0, 1]`
    pub success_rate_24h: f64,
}

/// 24-hour trend report for the outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trends24h {
    /// Window tag, always `"24h"`
    pub window: TrendsWindow,

    /// Hourly buckets in ascending time order
    pub buckets: Vec<TrendsBucket>,

    /// Rollup totals
    pub summary: TrendsSummary,
}

impl Trends24h {
    /// Most recent bucket
    pub fn last_bucket(&self) -> Option<&TrendsBucket> {
        self.buckets.last()
    }

    /// Start of the reporting window
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.buckets.first().map(|b| b.bucket_start)
    }

    /// Exclusive end of the reporting window
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.buckets.last().map(TrendsBucket::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_half_open() {
        let start = Utc::now();
        let bucket = TrendsBucket::empty(start);

        assert!(bucket.contains(start));
        assert!(bucket.contains(start + Duration::minutes(59)));
        assert!(!bucket.contains(start + Duration::hours(1)));
        assert!(!bucket.contains(start - Duration::milliseconds(1)));
    }

    #[test]
    fn test_window_serializes_as_24h() {
        let trends = Trends24h {
            window: TrendsWindow::Last24h,
            buckets: vec![],
            summary: TrendsSummary {
                total_queued: 0,
                total_sent: 0,
                total_failed: 0,
                oldest_pending: None,
                current_pending: 0,
                success_rate_24h: 0.0,
            },
        };

        let value = serde_json::to_value(&trends).unwrap();
        assert_eq!(value["window"], "24h");
        assert_eq!(value["summary"]["oldest_pending"], serde_json::Value::Null);
    }
}
