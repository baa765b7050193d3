//! HTTP page endpoint
//!
//! Performs a single GET per page with:
//! - Source-specific auth headers
//! - Rate limit header parsing
//! - Status classification into [`FetcherError`] variants
//!
//! Retries are left to the fetch loop.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::parser::{normalize_page, ResponseShape};
use super::{FetcherError, FetcherResult, Page, PageFetcher};
use crate::Cursor;

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest error body kept in a [`FetcherError::Rejected`]
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Rate limit headers reported by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Request quota for the current window
    pub limit: Option<u64>,
    /// Requests remaining in the current window
    pub remaining: Option<u64>,
    /// Quota reset, either unix seconds or seconds from now
    pub reset: Option<u64>,
    /// `Retry-After` in seconds
    pub retry_after_secs: Option<u64>,
}

impl RateLimitInfo {
    /// Parse the common API-Sports / RapidAPI spellings (case-insensitive)
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_u64(headers, "x-ratelimit-requests-limit")
                .or_else(|| header_u64(headers, "x-ratelimit-limit")),
            remaining: header_u64(headers, "x-ratelimit-requests-remaining")
                .or_else(|| header_u64(headers, "x-ratelimit-remaining")),
            reset: header_u64(headers, "x-ratelimit-requests-reset")
                .or_else(|| header_u64(headers, "x-ratelimit-reset")),
            retry_after_secs: header_u64(headers, "retry-after"),
        }
    }

    /// `Retry-After` as a duration, ignoring zero
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Whether the API reports no requests left in the window
    pub fn quota_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(header = name, value = raw, "Ignoring non-numeric rate limit header");
            None
        }
    }
}

/// How a page request encodes its position and size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStyle {
    /// Query parameter carrying the cursor or page number
    pub cursor_param: &'static str,
    /// Query parameter carrying the page size, if the API accepts one
    pub page_size_param: Option<&'static str>,
}

/// Map a non-success status and its headers to a fetcher error
pub fn classify_status(status: StatusCode, info: RateLimitInfo, body: &str) -> FetcherError {
    let code = status.as_u16();
    if code == 429 || (matches!(code, 503 | 504) && info.quota_exhausted()) {
        return FetcherError::RateLimited { status: code, info };
    }
    if status.is_server_error() {
        return FetcherError::Server { status: code, info };
    }
    if status.is_client_error() {
        return FetcherError::Rejected {
            status: code,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        };
    }
    // 1xx / 3xx that reqwest did not resolve
    FetcherError::Server { status: code, info }
}

/// Paginated listing endpoint reached over HTTP
pub struct HttpEndpoint {
    client: Client,
    source: String,
    url: String,
    headers: HeaderMap,
    query: QueryStyle,
    page_size: u32,
    shape: ResponseShape,
    initial_cursor: Option<Cursor>,
}

impl HttpEndpoint {
    /// Create an endpoint
    ///
    /// # Arguments
    /// * `source` - Short source name recorded in checkpoints
    /// * `url` - Full listing URL without query string
    /// * `headers` - Headers sent with every request (auth, host)
    /// * `query` - Cursor and page size parameter names
    /// * `page_size` - Items per page requested
    /// * `shape` - Response layout used to normalize bodies
    /// * `initial_cursor` - First page position
    /// * `timeout` - Per-request timeout
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        headers: &[(&'static str, String)],
        query: QueryStyle,
        page_size: u32,
        shape: ResponseShape,
        initial_cursor: Option<Cursor>,
        timeout: Duration,
    ) -> FetcherResult<Self> {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in headers {
            let value = HeaderValue::from_str(value).map_err(|e| {
                FetcherError::Config(format!("Invalid value for header {name}: {e}"))
            })?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetcherError::Config(format!("Invalid header name {name}: {e}")))?;
            header_map.insert(name, value);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .build()
            .map_err(|e| FetcherError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            source: source.into(),
            url: url.into(),
            headers: header_map,
            query,
            page_size,
            shape,
            initial_cursor,
        })
    }

    /// Listing URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters for one page request
    pub fn query_params(&self, cursor: Option<&Cursor>) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(2);
        if let Some(name) = self.query.page_size_param {
            params.push((name, self.page_size.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push((self.query.cursor_param, cursor.to_string()));
        }
        params
    }
}

#[async_trait]
impl PageFetcher for HttpEndpoint {
    fn source(&self) -> &str {
        &self.source
    }

    fn initial_cursor(&self) -> Option<Cursor> {
        self.initial_cursor.clone()
    }

    async fn fetch_page(&self, cursor: Option<&Cursor>) -> FetcherResult<Page> {
        let params = self.query_params(cursor);
        debug!(url = %self.url, ?params, "Requesting page");

        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetcherError::Timeout(e.to_string())
                } else {
                    FetcherError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let info = RateLimitInfo::from_headers(response.headers());
        debug!(status = status.as_u16(), remaining = ?info.remaining, "Response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, info, &body);
            warn!(error = %err, "Page request failed");
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetcherError::Timeout(e.to_string())
            } else {
                FetcherError::Network(format!("Failed to read response body: {e}"))
            }
        })?;
        let body: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).into_owned();
            FetcherError::MalformedResponse(format!("invalid JSON ({e}); body starts with {preview:?}"))
        })?;

        let mut page = normalize_page(body, &self.shape, cursor)?;
        page.rate_limit = info;
        Ok(page)
    }
}
