//! Fetch configuration and backoff calculation

use std::time::Duration;

use super::DownloadError;

/// Default request budget per minute.
/// API-Sports free plans allow 10 requests per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 5;

/// Default items per page for sources that accept a page size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Maximum number of retries per page (attempts = retries + 1).
pub const MAX_RETRIES: u32 = 5;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Consecutive empty pages tolerated before assuming end of data.
pub const MAX_EMPTY_PAGES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 2_000; // 2 seconds

/// Maximum backoff delay in milliseconds.
/// Retry 6 would be 64s, capped to 60s.
pub const MAX_BACKOFF_MS: u64 = 60_000; // 60 seconds

/// Wait used when the API reports an exhausted quota without saying when it resets.
pub const RESET_FALLBACK_SECS: u64 = 60;

/// Explicit configuration of a fetch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Request budget; requests are spaced `60s / requests_per_minute` apart
    pub requests_per_minute: u32,
    /// Items per page, for sources that take a page size
    pub page_size: u32,
    /// Retries per page after the first attempt
    pub max_retries: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Consecutive empty pages that end the run
    pub max_empty_pages: u32,
    /// First backoff delay
    pub initial_backoff: Duration,
    /// Backoff cap
    pub max_backoff: Duration,
    /// Ignore existing output and checkpoint
    pub fresh: bool,
    /// Sleep through an exhausted daily quota instead of stopping
    pub wait_for_reset: bool,
    /// Quota resets waited out in a row before giving up (`None` waits indefinitely)
    pub max_reset_waits: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: MAX_RETRIES,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_empty_pages: MAX_EMPTY_PAGES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            fresh: false,
            wait_for_reset: false,
            max_reset_waits: None,
        }
    }
}

impl FetchConfig {
    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.requests_per_minute == 0 {
            return Err(DownloadError::InvalidConfig(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(DownloadError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.max_empty_pages == 0 {
            return Err(DownloadError::InvalidConfig(
                "max_empty_pages must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(DownloadError::InvalidConfig(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(DownloadError::InvalidConfig(format!(
                "initial_backoff ({:?}) exceeds max_backoff ({:?})",
                self.initial_backoff, self.max_backoff
            )));
        }
        Ok(())
    }

    /// Attempts per page, counting the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.initial_backoff, self.max_backoff)
    }
}

/// Calculate exponential backoff delay: `initial * 2^(attempt-1)`, capped at `max`
pub fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    initial.saturating_mul(2u32.pow(exponent)).min(max)
}
