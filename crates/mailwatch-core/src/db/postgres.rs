//! PostgreSQL connection and outbox queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::OutboxStatus;

use super::OutboxStore;

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Outbox reads against the `outbox_items` table
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Create a new outbox store
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }

    async fn timestamps(
        &self,
        sql: &str,
        status: Option<OutboxStatus>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut query = sqlx::query_scalar::<_, DateTime<Utc>>(sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        if let Some(since) = since {
            query = query.bind(since);
        }

        let rows = query.fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "Fetched outbox timestamps");
        Ok(rows)
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn queued_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.timestamps(
            r#"
            SELECT created_at FROM outbox_items
            WHERE created_at >= $1
            "#,
            None,
            Some(since),
        )
        .await
    }

    async fn sent_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.timestamps(
            r#"
            SELECT sent_at FROM outbox_items
            WHERE status = $1 AND sent_at IS NOT NULL AND sent_at >= $2
            "#,
            Some(OutboxStatus::Sent),
            Some(since),
        )
        .await
    }

    async fn failed_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.timestamps(
            r#"
            SELECT updated_at FROM outbox_items
            WHERE status = $1 AND updated_at >= $2
            "#,
            Some(OutboxStatus::Failed),
            Some(since),
        )
        .await
    }

    async fn pending_oldest_first(&self) -> Result<Vec<DateTime<Utc>>> {
        self.timestamps(
            r#"
            SELECT created_at FROM outbox_items
            WHERE status = $1
            ORDER BY created_at ASC
            "#,
            Some(OutboxStatus::Pending),
            None,
        )
        .await
    }
}
