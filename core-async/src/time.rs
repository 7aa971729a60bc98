//! Time-related primitives.
//!
//! The status poller drives its rounds from [`interval_at`] and the result
//! fetcher backs off with [`sleep`]. Both come from `tokio::time`, so tests can
//! pause and advance the clock deterministically with `start_paused = true`.

pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior,
    Sleep, Timeout,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Error returned by [`timeout`] when the deadline elapses.
pub use tokio::time::error::Elapsed as TimeoutError;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
