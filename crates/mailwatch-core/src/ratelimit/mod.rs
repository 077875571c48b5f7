//! In-memory admission control
//!
//! A fixed-window counter per key. Requests at a window boundary can burst
//! up to twice the limit within a short span: the last moments of one window
//! and the first moments of the next each admit `limit` requests.

mod limiter;

pub use limiter::{
    RateLimitDecision, RateLimitEntry, RateLimitPolicy, RateLimiter, RateLimiterStats,
    DEFAULT_CLEANUP_INTERVAL,
};
