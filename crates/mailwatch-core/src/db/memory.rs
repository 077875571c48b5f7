//! In-process outbox store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{OutboxItem, OutboxStatus};

use super::OutboxStore;

/// Outbox held in memory, for embedding and tests
#[derive(Default)]
pub struct MemoryOutboxStore {
    items: RwLock<Vec<OutboxItem>>,
}

impl MemoryOutboxStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new message and return its id
    pub fn enqueue(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Uuid {
        let item = OutboxItem::pending(recipient, subject, at);
        let id = item.id;
        self.items.write().push(item);
        id
    }

    /// Insert an item as-is
    pub fn insert(&self, item: OutboxItem) -> Result<()> {
        item.validate()?;
        self.items.write().push(item);
        Ok(())
    }

    /// Record a successful delivery
    pub fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.update(id, |item| item.mark_sent(at))
    }

    /// Record a failed delivery
    pub fn mark_failed(&self, id: Uuid, error: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        let error = error.into();
        self.update(id, move |item| item.mark_failed(error, at))
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut OutboxItem)) -> Result<()> {
        let mut items = self.items.write();
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| Error::not_found("outbox item", id.to_string()))?;
        f(item);
        Ok(())
    }

    fn collect(&self, f: impl Fn(&OutboxItem) -> Option<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
        self.items.read().iter().filter_map(f).collect()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn queued_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.collect(|item| Some(item.created_at).filter(|t| *t >= since)))
    }

    async fn sent_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.collect(|item| match (item.status, item.sent_at) {
            (OutboxStatus::Sent, Some(at)) if at >= since => Some(at),
            _ => None,
        }))
    }

    async fn failed_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.collect(|item| {
            (item.status == OutboxStatus::Failed && item.updated_at >= since)
                .then_some(item.updated_at)
        }))
    }

    async fn pending_oldest_first(&self) -> Result<Vec<DateTime<Utc>>> {
        let mut pending =
            self.collect(|item| (item.status == OutboxStatus::Pending).then_some(item.created_at));
        pending.sort_unstable();
        Ok(pending)
    }
}
