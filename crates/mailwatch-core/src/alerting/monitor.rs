//! Periodic outbox health checks

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::{Alert, Severity, Trends24h};
use crate::trends::TrendsAggregator;

use super::AlertEvaluator;

/// One aggregation-and-evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Trend report the verdict was computed from
    pub trends: Trends24h,
    /// Alert verdict
    pub alert: Alert,
}

/// Runs the trends aggregator and alert evaluator on a fixed interval
pub struct OutboxMonitor {
    aggregator: TrendsAggregator,
    evaluator: AlertEvaluator,
    check_interval: Duration,
    latest_tx: watch::Sender<Option<MonitorReport>>,
}

impl OutboxMonitor {
    /// Create a new monitor
    pub fn new(
        aggregator: TrendsAggregator,
        evaluator: AlertEvaluator,
        check_interval: Duration,
    ) -> Self {
        let (latest_tx, _) = watch::channel(None);
        Self {
            aggregator,
            evaluator,
            check_interval,
            latest_tx,
        }
    }

    /// Subscribe to the most recent report
    pub fn subscribe(&self) -> watch::Receiver<Option<MonitorReport>> {
        self.latest_tx.subscribe()
    }

    /// Most recent report, if a cycle has completed
    pub fn latest(&self) -> Option<MonitorReport> {
        self.latest_tx.borrow().clone()
    }

    /// Run a single cycle and publish its report
    pub async fn run_once(&self) -> Result<MonitorReport> {
        let trends = self.aggregator.execute().await?;
        let generated_at = Utc::now();
        let alert = self.evaluator.evaluate_at(&trends, generated_at);

        record_metrics(&trends, &alert);
        log_verdict(&alert);

        let report = MonitorReport {
            generated_at,
            trends,
            alert,
        };
        self.latest_tx.send_replace(Some(report.clone()));

        Ok(report)
    }

    /// Run cycles until `shutdown` is cancelled
    ///
    /// A failed cycle is logged and retried on the next tick.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            "Starting outbox monitor"
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Outbox monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Outbox monitor cycle failed");
                    }
                }
            }
        }
    }
}

fn log_verdict(alert: &Alert) {
    if alert.ok {
        debug!("Outbox healthy");
        return;
    }

    let reasons: Vec<&str> = alert.reasons.iter().map(|r| r.as_str()).collect();
    let details = serde_json::to_string(&alert.details).unwrap_or_default();

    match alert.severity {
        Severity::Critical => error!(?reasons, %details, "Outbox alert (critical)"),
        Severity::Warning => warn!(?reasons, %details, "Outbox alert (warning)"),
    }
}

fn record_metrics(trends: &Trends24h, alert: &Alert) {
    let summary = &trends.summary;
    metrics::gauge!("mailwatch_outbox_pending").set(summary.current_pending as f64);
    metrics::gauge!("mailwatch_outbox_queued_24h").set(summary.total_queued as f64);
    metrics::gauge!("mailwatch_outbox_sent_24h").set(summary.total_sent as f64);
    metrics::gauge!("mailwatch_outbox_failed_24h").set(summary.total_failed as f64);
    metrics::gauge!("mailwatch_outbox_success_rate_24h").set(summary.success_rate_24h);
    metrics::gauge!("mailwatch_outbox_alert_active").set(if alert.ok { 0.0 } else { 1.0 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::alerting::AlertConfig;
    use crate::db::MemoryOutboxStore;
    use crate::models::AlertReason;

    fn monitor_for(store: Arc<MemoryOutboxStore>) -> OutboxMonitor {
        OutboxMonitor::new(
            TrendsAggregator::new(store),
            AlertEvaluator::with_config(AlertConfig {
                pending_threshold: 2,
                ..AlertConfig::default()
            }),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_run_once_publishes_report() {
        let store = Arc::new(MemoryOutboxStore::new());
        for i in 0..3 {
            store.enqueue(format!("user{i}@example.com"), "Invoice", Utc::now());
        }
        let monitor = monitor_for(store);
        let rx = monitor.subscribe();
        assert!(monitor.latest().is_none());

        let report = monitor.run_once().await.unwrap();

        assert_eq!(report.trends.summary.current_pending, 3);
        assert!(report.alert.has_reason(AlertReason::PendingHigh));
        assert!(rx.borrow().is_some());
        assert_eq!(monitor.latest().unwrap().alert, report.alert);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let monitor = Arc::new(monitor_for(Arc::new(MemoryOutboxStore::new())));
        let mut rx = monitor.subscribe();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let monitor = monitor.clone();
            let shutdown = shutdown.clone();
            async move { monitor.run(shutdown).await }
        });

        rx.changed().await.unwrap();
        assert!(rx.borrow().as_ref().is_some_and(|r| r.alert.ok));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
