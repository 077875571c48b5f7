//! Alert threshold resolution

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable for [`AlertConfig::pending_threshold`]
pub const PENDING_THRESHOLD_ENV: &str = "MAILWATCH_ALERT_PENDING_THRESHOLD";
/// Environment variable for [`AlertConfig::oldest_pending_max_age_minutes`]
pub const OLDEST_PENDING_MAX_AGE_ENV: &str = "MAILWATCH_ALERT_OLDEST_PENDING_MAX_AGE_MINUTES";
/// Environment variable for [`AlertConfig::failure_spike_threshold`]
pub const FAILURE_SPIKE_THRESHOLD_ENV: &str = "MAILWATCH_ALERT_FAILURE_SPIKE_THRESHOLD";

const DEFAULT_PENDING_THRESHOLD: u64 = 50;
const DEFAULT_OLDEST_PENDING_MAX_AGE_MINUTES: u64 = 30;
const DEFAULT_FAILURE_SPIKE_THRESHOLD: u64 = 10;

/// Thresholds used by the alert evaluator
///
/// Values are taken as given; callers are responsible for sane numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Pending items above which `PENDING_HIGH` fires
    pub pending_threshold: u64,
    /// Oldest pending age, in minutes, above which `OLDEST_PENDING_AGE` fires
    pub oldest_pending_max_age_minutes: u64,
    /// Failures in the latest bucket above which `FAILURE_SPIKE` fires
    pub failure_spike_threshold: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            pending_threshold: DEFAULT_PENDING_THRESHOLD,
            oldest_pending_max_age_minutes: DEFAULT_OLDEST_PENDING_MAX_AGE_MINUTES,
            failure_spike_threshold: DEFAULT_FAILURE_SPIKE_THRESHOLD,
        }
    }
}

/// Explicitly supplied thresholds; unset fields fall back to the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfigOverrides {
    /// See [`AlertConfig::pending_threshold`]
    pub pending_threshold: Option<u64>,
    /// See [`AlertConfig::oldest_pending_max_age_minutes`]
    pub oldest_pending_max_age_minutes: Option<u64>,
    /// See [`AlertConfig::failure_spike_threshold`]
    pub failure_spike_threshold: Option<u64>,
}

impl AlertConfig {
    /// Resolve thresholds: overrides, then process environment, then defaults
    pub fn resolve(overrides: AlertConfigOverrides) -> Self {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve thresholds against a custom environment lookup
    pub fn resolve_with(
        overrides: AlertConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            pending_threshold: resolve_value(
                overrides.pending_threshold,
                &lookup,
                PENDING_THRESHOLD_ENV,
                DEFAULT_PENDING_THRESHOLD,
            ),
            oldest_pending_max_age_minutes: resolve_value(
                overrides.oldest_pending_max_age_minutes,
                &lookup,
                OLDEST_PENDING_MAX_AGE_ENV,
                DEFAULT_OLDEST_PENDING_MAX_AGE_MINUTES,
            ),
            failure_spike_threshold: resolve_value(
                overrides.failure_spike_threshold,
                &lookup,
                FAILURE_SPIKE_THRESHOLD_ENV,
                DEFAULT_FAILURE_SPIKE_THRESHOLD,
            ),
        }
    }
}

fn resolve_value(
    value: Option<u64>,
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> u64 {
    value.unwrap_or_else(|| from_env(lookup, key, default))
}

fn from_env(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, default, "Ignoring unparseable alert threshold");
            default
        }
    }
}
