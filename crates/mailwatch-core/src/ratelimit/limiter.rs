//! Fixed-window rate limiter

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// How often expired entries are swept unless configured otherwise
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A `(limit, window)` pair for one rate-limited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests admitted per window
    pub limit: u32,
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Create a new policy
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Outcome of a [`RateLimiter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_time: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Convert a rejection into [`Error::RateLimit`]
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(Error::RateLimit)
        }
    }
}

/// Counter state for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// The rate-limited identity
    pub key: String,
    /// Requests admitted in the current window
    pub count: u32,
    /// When the current window ends
    pub reset_time: DateTime<Utc>,
}

/// Snapshot of the limiter's table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterStats {
    /// Number of tracked keys
    pub active_keys: usize,
    /// Tracked entries, sorted by key
    pub entries: Vec<RateLimitEntry>,
}

/// Fixed-window rate limiter keyed by an arbitrary string
///
/// `check` runs under the map shard's lock for its key, so the
/// read-then-increment step is atomic per key.
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    cleanup: Mutex<Option<CleanupTask>>,
}

struct CleanupTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter without a background sweep
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            cleanup: Mutex::new(None),
        }
    }

    /// Create a limiter that sweeps expired entries every `cleanup_interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_cleanup(cleanup_interval: Duration) -> Self {
        let limiter = Self::new();
        limiter.start_cleanup(cleanup_interval);
        limiter
    }

    /// Admit or reject a request for `key`
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(key, limit, window, Utc::now())
    }

    /// Admit or reject a request using a configured policy
    pub fn check_policy(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.check(key, policy.limit, policy.window)
    }

    /// Admit or reject a request for `key` as of `now`
    pub fn check_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let fresh = || RateLimitEntry {
            key: key.to_string(),
            count: 1,
            reset_time: window_end(now, window),
        };

        let decision = match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let entry = slot.insert(fresh());
                admitted(limit, &entry)
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.reset_time <= now {
                    *entry = fresh();
                    admitted(limit, entry)
                } else if entry.count >= limit {
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_time: entry.reset_time,
                    }
                } else {
                    entry.count += 1;
                    admitted(limit, entry)
                }
            }
        };

        if !decision.allowed {
            metrics::counter!("mailwatch_ratelimit_rejected_total").increment(1);
            debug!(key, limit, reset_time = %decision.reset_time, "Rate limit exceeded");
        }

        decision
    }

    /// Remove every entry whose window has ended
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.entries, Utc::now())
    }

    /// Remove every entry whose window ended at or before `now`
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        sweep(&self.entries, now)
    }

    /// Start the periodic sweep, replacing any running one
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_cleanup(&self, cleanup_interval: Duration) {
        let shutdown = CancellationToken::new();
        let entries = Arc::clone(&self.entries);
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = sweep(&entries, Utc::now());
                        if removed > 0 {
                            debug!(removed, remaining = entries.len(), "Swept expired rate limit entries");
                        }
                    }
                }
            }
        });

        let previous = self.cleanup.lock().replace(CleanupTask { shutdown, handle });
        if let Some(previous) = previous {
            previous.shutdown.cancel();
        }

        info!(
            interval_secs = cleanup_interval.as_secs(),
            "Rate limiter cleanup started"
        );
    }

    /// Whether a background sweep is running
    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Current table contents
    pub fn stats(&self) -> RateLimiterStats {
        let mut entries: Vec<RateLimitEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        RateLimiterStats {
            active_keys: entries.len(),
            entries,
        }
    }

    /// Drop all entries
    pub fn reset(&self) {
        self.entries.clear();
    }

    /// Stop the background sweep
    pub fn destroy(&self) {
        if let Some(task) = self.cleanup.lock().take() {
            task.shutdown.cancel();
            info!("Rate limiter cleanup stopped");
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup.get_mut().take() {
            task.shutdown.cancel();
        }
    }
}

fn admitted(limit: u32, entry: &RateLimitEntry) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        remaining: limit.saturating_sub(entry.count),
        reset_time: entry.reset_time,
    }
}

fn window_end(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_add_signed(w))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// Keys are collected first, then each is removed only if still expired, so a
// window renewed by a concurrent `check` survives.
fn sweep(entries: &DashMap<String, RateLimitEntry>, now: DateTime<Utc>) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|e| e.reset_time <= now)
        .map(|e| e.key().clone())
        .collect();

    expired
        .into_iter()
        .filter(|key| entries.remove_if(key, |_, e| e.reset_time <= now).is_some())
        .count()
}
