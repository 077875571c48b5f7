//! Alerting for Mailwatch
//!
//! Threshold resolution, pure evaluation of trend reports, and the periodic
//! monitor that ties the aggregator and evaluator together.

mod thresholds;
mod evaluator;
mod monitor;

pub use evaluator::AlertEvaluator;
pub use monitor::{MonitorReport, OutboxMonitor};
pub use thresholds::{
    AlertConfig, AlertConfigOverrides, FAILURE_SPIKE_THRESHOLD_ENV, OLDEST_PENDING_MAX_AGE_ENV,
    PENDING_THRESHOLD_ENV,
};
