//! Request spacing and server-directed waits
//!
//! Implements a fixed-interval request limiter plus helpers that turn
//! rate limit responses into wait durations.

use std::time::Duration;

use super::clock::Clock;
use super::config::FetchConfig;
use crate::fetcher::{FetcherError, RateLimitInfo};

/// Longest `reset` value read as "seconds from now" (one day)
const MAX_RELATIVE_RESET_SECS: u64 = 86_400;

/// Fixed-spacing request limiter
///
/// Consecutive requests are at least `window / max_requests` apart. The
/// interval never adapts to server feedback.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Option<Duration>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` requests per minute
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::request_based(requests_per_minute, Duration::from_secs(60))
    }

    /// Create a request-based limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window (0 is treated as 1)
    /// * `window` - Time window for rate limit
    pub fn request_based(max_requests: u32, window: Duration) -> Self {
        Self {
            interval: window / max_requests.max(1),
            last_request: None,
        }
    }

    /// Minimum spacing between requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time to wait at `now` before the next request may start
    pub fn required_wait(&self, now: Duration) -> Duration {
        match self.last_request {
            Some(last) => (last + self.interval).saturating_sub(now),
            None => Duration::ZERO,
        }
    }

    /// Record that a request started at `now`
    pub fn record_request(&mut self, now: Duration) {
        self.last_request = Some(now);
    }

    /// Wait until the next request may start and record it
    ///
    /// # Returns
    /// The delay that was applied
    pub async fn acquire(&mut self, clock: &dyn Clock) -> Duration {
        let wait = self.required_wait(clock.now());
        if !wait.is_zero() {
            clock.sleep(wait).await;
        }
        self.record_request(clock.now());
        wait
    }
}

/// Delay before retrying after `err` on retry number `attempt` (1-based)
///
/// A server `Retry-After` hint replaces the computed backoff.
pub fn backoff_delay(err: &FetcherError, attempt: u32, config: &FetchConfig) -> Duration {
    err.retry_after().unwrap_or_else(|| config.backoff(attempt))
}

/// Wait until an exhausted quota resets
///
/// Uses `Retry-After` first, then the reset header read as a unix timestamp
/// (when it lies within the next day) or as relative seconds, then
/// `fallback`.
pub fn reset_wait(info: &RateLimitInfo, now_unix: i64, fallback: Duration) -> Duration {
    if let Some(retry_after) = info.retry_after() {
        return retry_after;
    }

    if let Some(reset) = info.reset {
        let as_timestamp = i64::try_from(reset).unwrap_or(i64::MAX);
        let until = as_timestamp.saturating_sub(now_unix);
        if until > 0 && until as u64 <= MAX_RELATIVE_RESET_SECS {
            return Duration::from_secs(until as u64);
        }
        if reset > 0 && reset <= MAX_RELATIVE_RESET_SECS {
            return Duration::from_secs(reset);
        }
    }

    fallback
}
