//! End-to-end flow: outbox store -> trends -> alert verdict, plus the rate
//! limiter lifecycle as an embedding application would drive it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

use mailwatch::prelude::*;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn thresholds() -> AlertConfig {
    AlertConfig {
        pending_threshold: 50,
        oldest_pending_max_age_minutes: 30,
        failure_spike_threshold: 10,
    }
}

#[tokio::test]
async fn backlog_of_75_is_a_pending_warning() {
    let store = Arc::new(MemoryOutboxStore::new());
    for i in 0..75 {
        store.enqueue(
            format!("user{i}@example.com"),
            "Newsletter",
            now() - chrono::Duration::minutes(5),
        );
    }

    let trends = TrendsAggregator::new(store).execute_at(now()).await.unwrap();
    let alert = AlertEvaluator::with_config(thresholds()).evaluate_at(&trends, now());

    assert_eq!(trends.buckets.len(), 24);
    assert_eq!(trends.summary.current_pending, 75);
    assert_eq!(alert.reasons, vec![AlertReason::PendingHigh]);
    assert_eq!(alert.severity, Severity::Warning);
    assert!(!alert.ok);
}

#[tokio::test]
async fn backlog_of_100_is_critical() {
    let store = Arc::new(MemoryOutboxStore::new());
    for i in 0..100 {
        store.enqueue(
            format!("user{i}@example.com"),
            "Newsletter",
            now() - chrono::Duration::minutes(5),
        );
    }

    let trends = TrendsAggregator::new(store).execute_at(now()).await.unwrap();
    let alert = AlertEvaluator::with_config(thresholds()).evaluate_at(&trends, now());

    assert_eq!(alert.reasons, vec![AlertReason::PendingHigh]);
    assert_eq!(alert.severity, Severity::Critical);
}

#[tokio::test]
async fn failures_in_the_last_hour_spike() {
    let store = Arc::new(MemoryOutboxStore::new());
    for i in 0..15 {
        let id = store.enqueue(
            format!("user{i}@example.com"),
            "Receipt",
            now() - chrono::Duration::hours(3),
        );
        store
            .mark_failed(id, "421 try again later", now() - chrono::Duration::minutes(15))
            .unwrap();
    }

    let trends = TrendsAggregator::new(store).execute_at(now()).await.unwrap();
    let alert = AlertEvaluator::with_config(thresholds()).evaluate_at(&trends, now());

    assert_eq!(trends.buckets[23].failed, 15);
    assert!(alert.has_reason(AlertReason::FailureSpike));
    assert_eq!(alert.severity, Severity::Critical);

    let json = serde_json::to_value(&alert).unwrap();
    assert_eq!(json["reasons"], serde_json::json!(["FAILURE_SPIKE"]));
    assert_eq!(json["severity"], "critical");
}

#[tokio::test]
async fn monitor_publishes_reports_until_cancelled() {
    let store = Arc::new(MemoryOutboxStore::new());
    store.enqueue("ops@example.com", "Alert digest", Utc::now());

    let monitor = Arc::new(OutboxMonitor::new(
        TrendsAggregator::new(store),
        AlertEvaluator::with_config(thresholds()),
        Duration::from_millis(20),
    ));
    let mut reports = monitor.subscribe();
    let shutdown = tokio_util::sync::CancellationToken::new();

    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let shutdown = shutdown.clone();
        async move { monitor.run(shutdown).await }
    });

    reports.changed().await.unwrap();
    let report = monitor.latest().unwrap();
    assert_eq!(report.trends.summary.current_pending, 1);
    assert!(report.alert.ok);

    shutdown.cancel();
    task.await.unwrap();
}

#[test]
fn rate_limiter_admits_five_then_rejects() {
    let limiter = RateLimiter::new();
    let window = Duration::from_millis(60_000);

    for _ in 0..5 {
        assert!(limiter.check("ip1", 5, window).allowed);
    }
    let sixth = limiter.check("ip1", 5, window);

    assert!(!sixth.allowed);
    assert_eq!(sixth.remaining, 0);
    assert_eq!(limiter.stats().active_keys, 1);
}

#[tokio::test]
async fn rate_limiter_cleanup_lifecycle() {
    let limiter = RateLimiter::with_cleanup(Duration::from_secs(300));
    assert!(limiter.is_cleanup_running());

    limiter.check("ip1", 5, Duration::from_secs(60));
    limiter.reset();
    assert_eq!(limiter.stats().active_keys, 0);

    limiter.destroy();
    assert!(!limiter.is_cleanup_running());
}
