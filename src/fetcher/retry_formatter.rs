//! Retry message formatting
//!
//! Consistent, user-facing log lines for retries, recoveries and final
//! failures of a page request.

use std::time::Duration;

use crate::Cursor;

/// Classification of fetch errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other transport errors
    NetworkGeneric,
    /// HTTP 429 or exhausted quota
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// 2xx body that could not be normalized
    MalformedResponse,
    /// Error payload inside a 2xx response
    ApiError,
    /// HTTP 400 invalid request
    InvalidRequest,
    /// Authentication failures (401/403)
    AuthFailed(u16),
    /// Other client errors (4xx, except 429)
    ClientError(u16),
}

impl RetryErrorType {
    /// User-friendly description used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkGeneric => "network error",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::MalformedResponse => "malformed response",
            Self::ApiError => "API reported an error",
            Self::InvalidRequest => "invalid request",
            Self::AuthFailed(code) => match code {
                401 => "authentication failed (401)",
                403 => "authentication failed (403)",
                _ => "authentication failed",
            },
            Self::ClientError(code) => match code {
                404 => "resource not found",
                _ => "client error",
            },
        }
    }

    /// Suggested remediation shown after a failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection or raise --timeout",
            Self::NetworkGeneric => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => {
                "Lower --requests-per-minute, or pass --wait-for-reset to sleep through the daily quota"
            }
            Self::ServerError(_) => "The API may be experiencing issues, try again later",
            Self::MalformedResponse => "Check --host points at the listing API for --source",
            Self::ApiError => "Inspect the API error message; the key may lack access to this endpoint",
            Self::InvalidRequest => "Check --page-size and --host arguments",
            Self::AuthFailed(_) => "Verify --api-key or the source's API key environment variable",
            Self::ClientError(_) => "Review request parameters against the API documentation",
        }
    }

    /// Whether the error type is retried by the fetch loop.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RetryErrorType::InvalidRequest
                | RetryErrorType::AuthFailed(_)
                | RetryErrorType::ClientError(_)
        )
    }

    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "timeout",
            Self::NetworkGeneric => "network",
            Self::RateLimit => "rate_limit",
            Self::ServerError(_) => "server",
            Self::MalformedResponse => "malformed",
            Self::ApiError => "api",
            Self::InvalidRequest | Self::AuthFailed(_) | Self::ClientError(_) => "rejected",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts per page
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Wait until the next attempt
    pub backoff_duration: Duration,
    /// Source name
    pub source: String,
    /// Cursor of the page being fetched
    pub cursor: Option<Cursor>,
    /// Original error message for details
    pub error_message: String,
}

impl RetryContext {
    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({} {})",
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.source,
            self.page_label()
        )
    }

    /// Format message logged when a page succeeds after earlier failures.
    pub fn format_success(&self) -> String {
        format!(
            "Retry attempt {}/{} succeeded - resuming fetch ({} {})",
            self.attempt,
            self.max_attempts,
            self.source,
            self.page_label()
        )
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!("[FAILED] Page request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Source: {}", self.source),
            format!("  Position: {}", self.page_label()),
            "  Suggestions:".to_string(),
        ];
        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }
        lines.join("\n")
    }

    /// Suggestions tailored to the current context.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if self.error_type.is_retryable() {
            suggestions.push(format!(
                "Try increasing --max-retries (current: {})",
                self.max_attempts.saturating_sub(1)
            ));
        }
        suggestions.push("Re-run the same command to resume from the last saved page".to_string());
        suggestions
    }

    fn page_label(&self) -> String {
        match &self.cursor {
            Some(Cursor::Number(n)) => format!("page {n}"),
            Some(Cursor::Token(t)) => format!("cursor {t}"),
            None => "first page".to_string(),
        }
    }
}
