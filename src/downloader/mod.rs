//! Fetch orchestration and rate limiting
//!
//! This module provides the fetch-and-checkpoint loop with retry, throttling
//! and resume support.
//!
//! # Overview
//!
//! 1. **Configuration**: Describe the run with [`config::FetchConfig`]
//! 2. **Execution**: Drive a [`crate::fetcher::PageFetcher`] with [`executor::FetchExecutor`]
//! 3. **Rate Limiting**: Fixed request spacing via [`rate_limit::RateLimiter`]
//! 4. **Progress Tracking**: Per-page progress lines from [`progress::ProgressState`]
//! 5. **Resume Support**: Store and checkpoint persisted after every page
//!
//! # Quick Start
//!
//! ```no_run
//! use player_data_downloader::downloader::{FetchConfig, FetchExecutor};
//! use player_data_downloader::fetcher::sources::Source;
//! use player_data_downloader::resume::ResumePaths;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig {
//!     requests_per_minute: 10,
//!     ..FetchConfig::default()
//! };
//! let endpoint = Source::ApiSports.endpoint("my-api-key", None, &config)?;
//! let executor = FetchExecutor::new(config, ResumePaths::for_output("players_profiles.json"));
//! let report = executor.run(&endpoint).await?;
//! println!("{}: {} records", report.status, report.store.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`executor`] - The fetch loop
//! - [`job`] - Run status and report
//! - [`rate_limit`] - Request spacing and reset waits
//! - [`config`] - Configuration, defaults and backoff calculation
//! - [`clock`] - Injectable time source
//! - [`progress`] - Progress reporting
//!
//! # Error Handling
//!
//! Fetch failures never surface as `Err`: they end the run with a
//! [`RunStatus`] and the saved progress intact. `Err(DownloadError)` is
//! reserved for fatal conditions (persistence, lock, configuration).

pub mod clock;
pub mod config;
pub mod executor;
pub mod job;
pub mod progress;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FetchConfig;
pub use executor::FetchExecutor;
pub use job::{RunReport, RunStatus, RunSummary};
pub use rate_limit::RateLimiter;

use crate::resume::ResumeError;

/// Fatal fetch run errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Store or checkpoint could not be written
    #[error("persistence error: {0}")]
    Persistence(#[from] ResumeError),

    /// Another run holds the output lock
    #[error("output is locked by another run: {0}")]
    Locked(String),

    /// Configuration cannot be run with
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
