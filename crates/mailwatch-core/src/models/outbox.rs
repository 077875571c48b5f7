//! Outbox item data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle state of a queued message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    /// Waiting for delivery
    #[default]
    Pending,
    /// Delivered
    Sent,
    /// Delivery failed
    Failed,
}

impl OutboxStatus {
    /// Column value used by the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxItem {
    /// Unique identifier
    pub id: Uuid,

    /// Destination address
    pub recipient: String,

    /// Message subject
    pub subject: String,

    /// Current lifecycle state
    pub status: OutboxStatus,

    /// When the item was queued
    pub created_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,

    /// Delivery time, set only once sent
    pub sent_at: Option<DateTime<Utc>>,

    /// Last delivery error, set only once failed
    pub error_message: Option<String>,
}

impl OutboxItem {
    /// Create a freshly queued item
    pub fn pending(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            subject: subject.into(),
            status: OutboxStatus::Pending,
            created_at,
            updated_at: created_at,
            sent_at: None,
            error_message: None,
        }
    }

    /// Transition to `sent`
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.status = OutboxStatus::Sent;
        self.sent_at = Some(at);
        self.error_message = None;
        self.updated_at = at;
    }

    /// Transition to `failed`
    pub fn mark_failed(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.status = OutboxStatus::Failed;
        self.sent_at = None;
        self.error_message = Some(error.into());
        self.updated_at = at;
    }

    /// Check the status/timestamp invariants
    pub fn validate(&self) -> Result<()> {
        if self.sent_at.is_some() != (self.status == OutboxStatus::Sent) {
            return Err(Error::validation(format!(
                "outbox item {} has status '{}' but sent_at is {}",
                self.id,
                self.status,
                self.sent_at.map_or("unset", |_| "set")
            )));
        }

        if self.error_message.is_some() && self.status != OutboxStatus::Failed {
            return Err(Error::validation(format!(
                "outbox item {} carries an error message while '{}'",
                self.id, self.status
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_transitions_keep_invariants() {
        let now = Utc::now();
        let mut item = OutboxItem::pending("ops@example.com", "Weekly digest", now);
        assert!(item.validate().is_ok());

        item.mark_failed("smtp timeout", now + Duration::minutes(1));
        assert_eq!(item.status, OutboxStatus::Failed);
        assert!(item.validate().is_ok());

        item.mark_sent(now + Duration::minutes(2));
        assert_eq!(item.sent_at, Some(now + Duration::minutes(2)));
        assert!(item.error_message.is_none());
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_sent_at_without_sent_status() {
        let now = Utc::now();
        let mut item = OutboxItem::pending("ops@example.com", "Reset password", now);
        item.sent_at = Some(now);

        assert!(matches!(item.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OutboxStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
