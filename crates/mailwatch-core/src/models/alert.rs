//! Alert verdict data models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Condition that contributed to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReason {
    /// Too many items pending
    PendingHigh,
    /// The oldest pending item has waited too long
    OldestPendingAge,
    /// Too many failures in the latest hour
    FailureSpike,
}

impl AlertReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingHigh => "PENDING_HIGH",
            Self::OldestPendingAge => "OLDEST_PENDING_AGE",
            Self::FailureSpike => "FAILURE_SPIKE",
        }
    }
}

impl std::fmt::Display for AlertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning
    #[default]
    Warning,
    /// Critical
    Critical,
}

/// Outcome of evaluating a trend report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// True when no rule fired
    pub ok: bool,

    /// Rules that fired, in evaluation order
    pub reasons: Vec<AlertReason>,

    /// Measured values and the thresholds they were compared against
    pub details: BTreeMap<String, serde_json::Value>,

    /// Combined severity of the fired rules
    pub severity: Severity,
}

impl Alert {
    /// Verdict with nothing to report
    pub fn healthy() -> Self {
        Self {
            ok: true,
            reasons: Vec::new(),
            details: BTreeMap::new(),
            severity: Severity::Warning,
        }
    }

    /// Whether a specific rule fired
    pub fn has_reason(&self, reason: AlertReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// Whether the verdict needs immediate attention
    pub fn is_critical(&self) -> bool {
        !self.ok && self.severity == Severity::Critical
    }
}

impl Default for Alert {
    fn default() -> Self {
        Self::healthy()
    }
}
