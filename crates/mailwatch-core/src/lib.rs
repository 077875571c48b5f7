//! # Mailwatch
//!
//! Monitoring and admission control for an outbound message queue.
//!
//! Mailwatch summarizes the outbox's last 24 hours into hourly buckets, turns
//! those summaries into warning/critical alerts, and bounds caller request
//! rates with an in-memory fixed-window limiter.
//!
//! ## Architecture
//!
//! - **Trends**: 24 hourly buckets plus rollups, built from four store reads
//! - **Alerting**: pure threshold evaluation and a periodic monitor loop
//! - **Rate limiting**: per-key fixed-window counters with a background sweep
//! - **Storage**: read-only access to the outbox in PostgreSQL or in memory
//!
//! ## Quick Start
//!
//! ```bash
//! # Print the current trend report
//! mailwatch trends
//!
//! # Evaluate alerts every minute until interrupted
//! mailwatch watch
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod alerting;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod trends;

pub use crate::config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertConfig, AlertConfigOverrides, AlertEvaluator, OutboxMonitor};
    pub use crate::config::Config;
    pub use crate::db::{MemoryOutboxStore, OutboxStore, PostgresOutboxStore, PostgresPool};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::ratelimit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
    pub use crate::trends::TrendsAggregator;
}
