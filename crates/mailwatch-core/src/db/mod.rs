//! Outbox store access
//!
//! Mailwatch only reads the outbox. The store itself belongs to the embedding
//! application; this module defines the four reads the trend report needs and
//! provides a PostgreSQL and an in-memory implementation.

mod memory;
mod postgres;

pub use memory::MemoryOutboxStore;
pub use postgres::{PostgresOutboxStore, PostgresPool};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The reads issued for a trend report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxQuery {
    /// Items created in the window
    Queued,
    /// Items sent in the window
    Sent,
    /// Items failed in the window
    Failed,
    /// Items currently pending
    Pending,
}

impl OutboxQuery {
    /// Short name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for OutboxQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the outbox used by the trends aggregator
///
/// The four reads are not transactionally coupled; state changes between
/// them can make sent/failed totals drift slightly from queued/pending counts
/// within one report.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// `created_at` of every item created at or after `since`
    async fn queued_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    /// `sent_at` of every sent item delivered at or after `since`
    async fn sent_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    /// `updated_at` of every failed item updated at or after `since`
    async fn failed_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    /// `created_at` of every pending item, oldest first
    async fn pending_oldest_first(&self) -> Result<Vec<DateTime<Utc>>>;
}
