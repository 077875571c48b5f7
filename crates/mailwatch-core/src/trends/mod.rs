//! 24-hour trend reporting for the outbox
//!
//! Reads queued, sent, failed and pending timestamps from the store and folds
//! them into 24 hourly buckets with rollup totals.

mod aggregator;

pub use aggregator::{build_trends, TrendsAggregator};
