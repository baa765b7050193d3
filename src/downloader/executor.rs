//! Fetch executor: the paginated fetch-and-checkpoint loop

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn, Instrument};

use crate::downloader::clock::{Clock, SystemClock};
use crate::downloader::config::{FetchConfig, RESET_FALLBACK_SECS};
use crate::downloader::job::{RunReport, RunStatus};
use crate::downloader::progress::ProgressState;
use crate::downloader::rate_limit::{backoff_delay, reset_wait, RateLimiter};
use crate::downloader::DownloadError;
use crate::fetcher::retry_formatter::{RetryContext, RetryErrorType};
use crate::fetcher::{FetcherError, Page, PageFetcher};
use crate::metrics::{self, PersistTimer};
use crate::resume::{ResumePaths, ResumeState, RunLock};
use crate::shutdown::{self, SharedShutdown};
use crate::Cursor;

/// Per-run counters
#[derive(Debug, Default)]
struct RunCounters {
    pages: u64,
    records_added: usize,
    retries: u64,
}

/// Drives a [`PageFetcher`] to the end of data, persisting after every page
pub struct FetchExecutor {
    config: FetchConfig,
    paths: ResumePaths,
    clock: Arc<dyn Clock>,
    shutdown: Option<SharedShutdown>,
}

impl FetchExecutor {
    /// Create an executor writing to `paths`
    ///
    /// Uses the system clock and the global shutdown handle, if registered.
    pub fn new(config: FetchConfig, paths: ResumePaths) -> Self {
        Self {
            config,
            paths,
            clock: Arc::new(SystemClock::new()),
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Output, checkpoint and lock locations
    pub fn paths(&self) -> &ResumePaths {
        &self.paths
    }

    /// Fetch every remaining page of `fetcher`
    ///
    /// # Returns
    /// A report whose status says how the run ended. Fetch failures end the
    /// run with a non-complete status and leave the saved progress intact.
    ///
    /// # Errors
    /// - [`DownloadError::InvalidConfig`] for unusable configuration
    /// - [`DownloadError::Locked`] when another run holds the output lock
    /// - [`DownloadError::Persistence`] when the store or checkpoint cannot be written
    pub async fn run(&self, fetcher: &dyn PageFetcher) -> Result<RunReport, DownloadError> {
        let span = tracing::info_span!(
            "fetch_run",
            source = %fetcher.source(),
            output = %self.paths.output.display()
        );
        self.run_locked(fetcher).instrument(span).await
    }

    async fn run_locked(&self, fetcher: &dyn PageFetcher) -> Result<RunReport, DownloadError> {
        self.config.validate()?;

        let mut lock = RunLock::open(&self.paths.lock)?;
        let _guard = lock
            .try_exclusive()
            .map_err(|e| DownloadError::Locked(format!("{}: {e}", self.paths.lock.display())))?;

        let source = fetcher.source().to_string();
        let result = self.fetch_all(fetcher, &source).await;
        match &result {
            Ok(report) => {
                metrics::record_run_finished(&source, report.status.as_str());
                info!(
                    status = %report.status,
                    records = report.store.len(),
                    records_added = report.records_added,
                    pages_fetched = report.pages_fetched,
                    retries = report.retries,
                    "Fetch run finished"
                );
            }
            Err(e) => {
                metrics::record_run_finished(&source, "failed");
                error!(error = %e, "Fetch run failed");
            }
        }
        result
    }

    async fn fetch_all(
        &self,
        fetcher: &dyn PageFetcher,
        source: &str,
    ) -> Result<RunReport, DownloadError> {
        let now = self.clock.unix_time();
        let mut state = if self.config.fresh {
            info!("Fresh run requested, ignoring existing output and checkpoint");
            ResumeState::fresh(source, fetcher.initial_cursor(), now)
        } else {
            ResumeState::load_or_fresh(&self.paths, source, fetcher.initial_cursor(), now)
        };

        let mut counters = RunCounters::default();
        if state.is_completed() {
            info!(
                records = state.store().len(),
                "Checkpoint already complete, nothing to fetch"
            );
            return Ok(Self::report(RunStatus::AlreadyComplete, state, counters, None));
        }

        info!(
            next_cursor = ?state.next_cursor(),
            records = state.store().len(),
            requests_per_minute = self.config.requests_per_minute,
            "Starting fetch"
        );

        let mut limiter = RateLimiter::per_minute(self.config.requests_per_minute);
        let mut progress = ProgressState::new(
            self.clock.now(),
            state.checkpoint().pages_fetched(),
            state.checkpoint().total_pages(),
            state.store().len(),
        );
        let mut failed_attempts: u32 = 0;
        let mut empty_streak: u32 = 0;
        let mut reset_waits: u32 = 0;
        let mut last_error: Option<String> = None;
        let mut pending_retry: Option<RetryContext> = None;

        let status = loop {
            if self.shutdown_requested() {
                info!("Shutdown requested - stopping before next page");
                break RunStatus::Cancelled;
            }

            let wait = limiter.required_wait(self.clock.now());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "Throttling before next request");
                if !self.sleep_or_cancel(wait).await {
                    break RunStatus::Cancelled;
                }
            }
            limiter.record_request(self.clock.now());

            let cursor = state.next_cursor().cloned();
            debug!(cursor = ?cursor, attempt = failed_attempts + 1, "Fetching page");

            match fetcher.fetch_page(cursor.as_ref()).await {
                Ok(page) => {
                    if let Some(ctx) = pending_retry.take() {
                        info!("{}", ctx.format_success());
                    }
                    failed_attempts = 0;
                    reset_waits = 0;
                    last_error = None;

                    let Page {
                        records,
                        next,
                        total_pages,
                        skipped,
                        rate_limit,
                    } = page;
                    if records.is_empty() {
                        empty_streak += 1;
                    } else {
                        empty_streak = 0;
                    }
                    let page_records = records.len();

                    let now = self.clock.unix_time();
                    let end_of_data = next.is_none();
                    let added = state.apply_page(records, next, total_pages, now);
                    let done = end_of_data || empty_streak >= self.config.max_empty_pages;
                    if done {
                        state.mark_completed(now);
                    }

                    let timer = PersistTimer::start();
                    state.save(&self.paths)?;
                    timer.record();

                    counters.pages += 1;
                    counters.records_added += added;
                    progress.update(total_pages, state.store().len());
                    metrics::record_page(source, added, rate_limit.remaining);

                    info!(
                        cursor = ?cursor,
                        page_records = page_records,
                        added = added,
                        skipped = skipped,
                        quota_remaining = ?rate_limit.remaining,
                        "{}",
                        progress.format_progress(self.clock.now())
                    );

                    if done {
                        if end_of_data {
                            info!("No further pages reported, end of data reached");
                        } else {
                            info!(
                                empty_pages = empty_streak,
                                "Too many consecutive empty pages, assuming end of data"
                            );
                        }
                        break RunStatus::Completed;
                    }
                }
                Err(err) if err.is_daily_cap() => {
                    metrics::record_rate_limit(source, true);
                    last_error = Some(err.to_string());
                    if !self.config.wait_for_reset {
                        warn!(
                            error = %err,
                            "Daily request quota exhausted - stopping; re-run later or pass --wait-for-reset"
                        );
                        break RunStatus::DailyLimitReached;
                    }
                    if self
                        .config
                        .max_reset_waits
                        .is_some_and(|max| reset_waits >= max)
                    {
                        warn!(
                            reset_waits = reset_waits,
                            error = %err,
                            "Daily request quota still exhausted after waiting for resets - stopping"
                        );
                        break RunStatus::DailyLimitReached;
                    }
                    reset_waits += 1;

                    let info = err.rate_limit_info().cloned().unwrap_or_default();
                    let wait = reset_wait(
                        &info,
                        self.clock.unix_time(),
                        Duration::from_secs(RESET_FALLBACK_SECS),
                    );
                    warn!(
                        wait_secs = wait.as_secs(),
                        reset_waits = reset_waits,
                        "Daily request quota exhausted - waiting for reset"
                    );
                    if !self.sleep_or_cancel(wait).await {
                        break RunStatus::Cancelled;
                    }
                }
                Err(err) if !err.is_retryable() => {
                    last_error = Some(err.to_string());
                    let ctx = self.retry_context(
                        failed_attempts + 1,
                        source,
                        &cursor,
                        &err.to_string(),
                        err.error_type(),
                        Duration::ZERO,
                    );
                    error!("{}", ctx.format_failure());
                    break RunStatus::Rejected;
                }
                Err(err) => {
                    if matches!(err, FetcherError::RateLimited { .. }) {
                        metrics::record_rate_limit(source, false);
                    }
                    failed_attempts += 1;
                    last_error = Some(err.to_string());

                    if failed_attempts > self.config.max_retries {
                        let ctx = self.retry_context(
                            failed_attempts,
                            source,
                            &cursor,
                            &err.to_string(),
                            err.error_type(),
                            Duration::ZERO,
                        );
                        error!("{}", ctx.format_failure());
                        break RunStatus::RetriesExhausted;
                    }

                    let delay = backoff_delay(&err, failed_attempts, &self.config);
                    let ctx = self.retry_context(
                        failed_attempts + 1,
                        source,
                        &cursor,
                        &err.to_string(),
                        err.error_type(),
                        delay,
                    );
                    warn!(error = %err, "{}", ctx.format_retry());
                    metrics::record_retry(err.error_type().label(), delay);
                    counters.retries += 1;
                    pending_retry = Some(ctx);

                    if !self.sleep_or_cancel(delay).await {
                        break RunStatus::Cancelled;
                    }
                }
            }
        };

        Ok(Self::report(status, state, counters, last_error))
    }

    fn report(
        status: RunStatus,
        state: ResumeState,
        counters: RunCounters,
        error: Option<String>,
    ) -> RunReport {
        let total_pages_fetched = state.checkpoint().pages_fetched();
        let next_cursor = if state.is_completed() {
            None
        } else {
            state.next_cursor().cloned()
        };
        RunReport {
            status,
            store: state.into_store(),
            pages_fetched: counters.pages,
            total_pages_fetched,
            records_added: counters.records_added,
            retries: counters.retries,
            next_cursor,
            error,
        }
    }

    fn retry_context(
        &self,
        attempt: u32,
        source: &str,
        cursor: &Option<Cursor>,
        message: &str,
        error_type: RetryErrorType,
        backoff: Duration,
    ) -> RetryContext {
        RetryContext {
            attempt,
            max_attempts: self.config.max_attempts(),
            error_type,
            backoff_duration: backoff,
            source: source.to_string(),
            cursor: cursor.clone(),
            error_message: message.to_string(),
        }
    }

    /// Sleep on the clock; `false` if shutdown was requested first
    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        if self.shutdown_requested() {
            return false;
        }
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = self.clock.sleep(duration) => true,
                    _ = shutdown.wait_for_shutdown() => false,
                }
            }
            None => {
                self.clock.sleep(duration).await;
                true
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
