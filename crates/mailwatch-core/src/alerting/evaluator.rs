//! Alert rule evaluation over trend reports

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::{Alert, AlertReason, Severity, Trends24h};

use super::thresholds::{AlertConfig, AlertConfigOverrides};

/// Turns a [`Trends24h`] report into an [`Alert`] verdict
///
/// Evaluation is pure: no I/O, no shared state. Rules fire independently:
///
/// - `PENDING_HIGH`: `current_pending > pending_threshold`, critical at twice the threshold
/// - `OLDEST_PENDING_AGE`: oldest pending age above the limit, critical at twice the limit
/// - `FAILURE_SPIKE`: last bucket's failures above the threshold, always critical
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    config: AlertConfig,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(AlertConfigOverrides::default())
    }
}

impl AlertEvaluator {
    /// Create an evaluator, resolving unset thresholds from the environment
    pub fn new(overrides: AlertConfigOverrides) -> Self {
        Self::with_config(AlertConfig::resolve(overrides))
    }

    /// Create an evaluator with fully specified thresholds
    pub fn with_config(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Thresholds in effect
    pub fn config(&self) -> AlertConfig {
        self.config
    }

    /// Evaluate against the current time
    pub fn evaluate(&self, trends: &Trends24h) -> Alert {
        self.evaluate_at(trends, Utc::now())
    }

    /// Evaluate with ages measured from `now`
    pub fn evaluate_at(&self, trends: &Trends24h, now: DateTime<Utc>) -> Alert {
        let mut alert = Alert::healthy();
        let mut critical = false;
        let summary = &trends.summary;

        let pending = summary.current_pending;
        let pending_threshold = self.config.pending_threshold;
        if pending > pending_threshold {
            alert.reasons.push(AlertReason::PendingHigh);
            alert.details.insert("pending_count".into(), json!(pending));
            alert
                .details
                .insert("pending_threshold".into(), json!(pending_threshold));
            critical |= pending >= pending_threshold.saturating_mul(2);
        }

        if let Some(oldest) = summary.oldest_pending {
            let age_minutes = (now - oldest).num_milliseconds() as f64 / 60_000.0;
            let max_age = self.config.oldest_pending_max_age_minutes as f64;
            if age_minutes > max_age {
                alert.reasons.push(AlertReason::OldestPendingAge);
                alert.details.insert("oldest_pending".into(), json!(oldest));
                alert.details.insert(
                    "oldest_pending_age_minutes".into(),
                    json!((age_minutes * 10.0).round() / 10.0),
                );
                alert.details.insert(
                    "oldest_pending_max_age_minutes".into(),
                    json!(self.config.oldest_pending_max_age_minutes),
                );
                critical |= age_minutes >= max_age * 2.0;
            }
        }

        let last_failed = trends.last_bucket().map_or(0, |b| b.failed);
        let spike_threshold = self.config.failure_spike_threshold;
        if last_failed > spike_threshold {
            alert.reasons.push(AlertReason::FailureSpike);
            alert
                .details
                .insert("last_hour_failed".into(), json!(last_failed));
            alert
                .details
                .insert("failure_spike_threshold".into(), json!(spike_threshold));
            critical = true;
        }

        alert.ok = alert.reasons.is_empty();
        if critical {
            alert.severity = Severity::Critical;
        }

        alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use crate::trends::build_trends;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn evaluator() -> AlertEvaluator {
        AlertEvaluator::with_config(AlertConfig::default())
    }

    fn trends_with(current_pending: u64, oldest_pending: Option<DateTime<Utc>>) -> Trends24h {
        let mut trends = build_trends(now(), &[], &[], &[], &[]);
        trends.summary.current_pending = current_pending;
        trends.summary.oldest_pending = oldest_pending;
        trends
    }

    fn trends_with_last_failed(failed: u64) -> Trends24h {
        let mut trends = trends_with(0, None);
        if let Some(last) = trends.buckets.last_mut() {
            last.failed = failed;
        }
        trends
    }

    #[test]
    fn test_quiet_queue_is_ok() {
        let alert = evaluator().evaluate_at(&trends_with(0, None), now());

        assert_eq!(alert, Alert::healthy());
    }

    #[test]
    fn test_pending_high_warning() {
        let alert = evaluator().evaluate_at(&trends_with(75, None), now());

        assert!(!alert.ok);
        assert_eq!(alert.reasons, vec![AlertReason::PendingHigh]);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.details["pending_count"], json!(75));
        assert_eq!(alert.details["pending_threshold"], json!(50));
    }

    #[test]
    fn test_pending_high_critical_at_double_threshold() {
        let alert = evaluator().evaluate_at(&trends_with(100, None), now());

        assert_eq!(alert.reasons, vec![AlertReason::PendingHigh]);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[rstest]
    #[case(50, false, Severity::Warning)]
    #[case(51, true, Severity::Warning)]
    #[case(99, true, Severity::Warning)]
    #[case(100, true, Severity::Critical)]
    #[case(500, true, Severity::Critical)]
    fn test_pending_boundaries(
        #[case] pending: u64,
        #[case] fires: bool,
        #[case] severity: Severity,
    ) {
        let alert = evaluator().evaluate_at(&trends_with(pending, None), now());

        assert_eq!(alert.has_reason(AlertReason::PendingHigh), fires);
        assert_eq!(alert.severity, severity);
    }

    #[rstest]
    #[case(30, false, Severity::Warning)]
    #[case(31, true, Severity::Warning)]
    #[case(59, true, Severity::Warning)]
    #[case(60, true, Severity::Critical)]
    fn test_oldest_pending_age(
        #[case] age_minutes: i64,
        #[case] fires: bool,
        #[case] severity: Severity,
    ) {
        let oldest = now() - Duration::minutes(age_minutes);
        let alert = evaluator().evaluate_at(&trends_with(1, Some(oldest)), now());

        assert_eq!(alert.has_reason(AlertReason::OldestPendingAge), fires);
        assert_eq!(alert.severity, severity);
        if fires {
            assert_eq!(
                alert.details["oldest_pending_age_minutes"],
                json!(age_minutes as f64)
            );
            assert_eq!(alert.details["oldest_pending_max_age_minutes"], json!(30));
        }
    }

    #[test]
    fn test_failure_spike_is_always_critical() {
        let alert = evaluator().evaluate_at(&trends_with_last_failed(15), now());

        assert_eq!(alert.reasons, vec![AlertReason::FailureSpike]);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.details["last_hour_failed"], json!(15));
        assert_eq!(alert.details["failure_spike_threshold"], json!(10));
    }

    #[test]
    fn test_failure_spike_only_looks_at_last_bucket() {
        let mut trends = trends_with(0, None);
        trends.buckets[22].failed = 40;
        trends.buckets[23].failed = 10;

        let alert = evaluator().evaluate_at(&trends, now());

        assert!(alert.ok);
    }

    #[test]
    fn test_rules_combine() {
        let mut trends = trends_with_last_failed(11);
        trends.summary.current_pending = 60;
        trends.summary.oldest_pending = Some(now() - Duration::minutes(45));

        let alert = evaluator().evaluate_at(&trends, now());

        assert_eq!(
            alert.reasons,
            vec![
                AlertReason::PendingHigh,
                AlertReason::OldestPendingAge,
                AlertReason::FailureSpike,
            ]
        );
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.details.len(), 7);
    }

    #[test]
    fn test_warnings_alone_stay_warning() {
        let trends = trends_with(60, Some(now() - Duration::minutes(45)));

        let alert = evaluator().evaluate_at(&trends, now());

        assert_eq!(alert.reasons.len(), 2);
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn test_config_introspection() {
        let config = AlertConfig {
            pending_threshold: 7,
            oldest_pending_max_age_minutes: 12,
            failure_spike_threshold: 2,
        };

        assert_eq!(AlertEvaluator::with_config(config).config(), config);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let evaluator = AlertEvaluator::new(AlertConfigOverrides {
            pending_threshold: Some(1),
            oldest_pending_max_age_minutes: Some(2),
            failure_spike_threshold: Some(3),
        });

        assert_eq!(
            evaluator.config(),
            AlertConfig {
                pending_threshold: 1,
                oldest_pending_max_age_minutes: 2,
                failure_spike_threshold: 3,
            }
        );
    }

    proptest! {
        #[test]
        fn prop_pending_high_is_monotonic(
            threshold in 0u64..1_000,
            smaller in 0u64..5_000,
            extra in 0u64..5_000,
        ) {
            let evaluator = AlertEvaluator::with_config(AlertConfig {
                pending_threshold: threshold,
                ..AlertConfig::default()
            });

            let low = evaluator.evaluate_at(&trends_with(smaller, None), now());
            let high = evaluator.evaluate_at(&trends_with(smaller + extra, None), now());

            if low.has_reason(AlertReason::PendingHigh) {
                prop_assert!(high.has_reason(AlertReason::PendingHigh));
            }
            if low.is_critical() {
                prop_assert!(high.is_critical());
            }
        }
    }
}
