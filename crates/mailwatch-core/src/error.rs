//! Error types for Mailwatch

use thiserror::Error;

use crate::db::OutboxQuery;

/// Result type alias using Mailwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Mailwatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// One of the trend queries against the outbox store failed
    #[error("Outbox query '{query}' failed: {source}")]
    Query {
        /// The read that failed
        query: OutboxQuery,
        /// The store's error
        #[source]
        source: Box<Error>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap a store failure with the query that produced it
    pub fn query(query: OutboxQuery, source: Error) -> Self {
        Self::Query {
            query,
            source: Box::new(source),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
