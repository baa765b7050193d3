//! Page fetcher abstraction and implementations

use crate::{Cursor, Record};
use async_trait::async_trait;
use std::time::Duration;

pub mod http;
pub mod parser;
pub mod retry_formatter;
pub mod sources;

pub use http::{HttpEndpoint, RateLimitInfo};
pub use parser::{PaginationStyle, ResponseShape};
use retry_formatter::RetryErrorType;

/// Fetcher errors
///
/// Everything except [`FetcherError::Rejected`] is retryable by the fetch loop.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Request timed out
    #[error("network timeout: {0}")]
    Timeout(String),

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 5xx response
    #[error("server error: HTTP {status}")]
    Server {
        /// Response status code
        status: u16,
        /// Rate limit headers sent with the response
        info: RateLimitInfo,
    },

    /// Throttled by the API (HTTP 429, or a 5xx reporting no remaining quota)
    #[error("rate limit exceeded: HTTP {status}")]
    RateLimited {
        /// Response status code
        status: u16,
        /// Rate limit headers sent with the response
        info: RateLimitInfo,
    },

    /// Body could not be normalized into a page
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The API reported an error inside an otherwise successful response
    #[error("API error: {0}")]
    Api(String),

    /// Client error that retrying cannot fix (bad key, bad request)
    #[error("request rejected: HTTP {status}: {body}")]
    Rejected {
        /// Response status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Endpoint could not be constructed
    #[error("configuration error: {0}")]
    Config(String),
}

impl FetcherError {
    /// Whether the fetch loop should retry the same page
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetcherError::Rejected { .. } | FetcherError::Config(_)
        )
    }

    /// Server-provided wait hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetcherError::Server { info, .. } | FetcherError::RateLimited { info, .. } => {
                info.retry_after()
            }
            _ => None,
        }
    }

    /// Rate limit info when the error is a throttling response
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            FetcherError::RateLimited { info, .. } => Some(info),
            _ => None,
        }
    }

    /// Whether this is a throttling response reporting an exhausted quota
    pub fn is_daily_cap(&self) -> bool {
        self.rate_limit_info()
            .is_some_and(RateLimitInfo::quota_exhausted)
    }

    /// Classification used in retry log messages and metrics labels
    pub fn error_type(&self) -> RetryErrorType {
        match self {
            FetcherError::Timeout(_) => RetryErrorType::NetworkTimeout,
            FetcherError::Network(_) => RetryErrorType::NetworkGeneric,
            FetcherError::Server { status, .. } => RetryErrorType::ServerError(*status),
            FetcherError::RateLimited { .. } => RetryErrorType::RateLimit,
            FetcherError::MalformedResponse(_) => RetryErrorType::MalformedResponse,
            FetcherError::Api(_) => RetryErrorType::ApiError,
            FetcherError::Rejected { status, .. } => match status {
                400 => RetryErrorType::InvalidRequest,
                401 | 403 => RetryErrorType::AuthFailed(*status),
                _ => RetryErrorType::ClientError(*status),
            },
            FetcherError::Config(_) => RetryErrorType::InvalidRequest,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One normalized page of results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records on this page that carry an integer id
    pub records: Vec<Record>,
    /// Cursor of the following page; `None` at end of data
    pub next: Option<Cursor>,
    /// Total pages, when the endpoint reports it
    pub total_pages: Option<u64>,
    /// Items dropped because they had no integer id
    pub skipped: usize,
    /// Rate limit headers of the response
    pub rate_limit: RateLimitInfo,
}

/// A paginated listing endpoint
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short source name, recorded in the checkpoint
    fn source(&self) -> &str;

    /// Cursor of the first page (`None` when the API starts without one)
    fn initial_cursor(&self) -> Option<Cursor>;

    /// Fetch a single page
    ///
    /// Implementations perform exactly one request and never retry.
    async fn fetch_page(&self, cursor: Option<&Cursor>) -> FetcherResult<Page>;
}
