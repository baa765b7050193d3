//! Observability metrics for fetch runs
//!
//! Counters and histograms for pages, records, retries, quota hits and
//! snapshot persistence.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Optional Prometheus scrape endpoint (`--metrics-addr`)
//! - Recording without an installed exporter is a no-op

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent; later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint (e.g., "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "pages_fetched_total",
        Unit::Count,
        "Pages fetched and persisted"
    );
    describe_counter!(
        "records_added_total",
        Unit::Count,
        "Records seen for the first time"
    );
    describe_counter!(
        "fetch_retries_total",
        Unit::Count,
        "Page request retries by error type"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Wait before each retry"
    );
    describe_counter!(
        "rate_limit_hits_total",
        Unit::Count,
        "Throttling responses received"
    );
    describe_gauge!(
        "api_quota_remaining",
        Unit::Count,
        "Requests remaining as reported by the API"
    );
    describe_histogram!(
        "snapshot_persist_seconds",
        Unit::Seconds,
        "Time to durably write store and checkpoint"
    );
    describe_counter!(
        "runs_finished_total",
        Unit::Count,
        "Fetch runs finished by status"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record a persisted page
pub fn record_page(source: &str, records_added: usize, quota_remaining: Option<u64>) {
    counter!("pages_fetched_total", "source" => source.to_string()).increment(1);
    counter!("records_added_total", "source" => source.to_string())
        .increment(records_added as u64);
    if let Some(remaining) = quota_remaining {
        gauge!("api_quota_remaining", "source" => source.to_string()).set(remaining as f64);
    }
}

/// Record a retry and its backoff
pub fn record_retry(error_type: &'static str, backoff: Duration) {
    counter!("fetch_retries_total", "error_type" => error_type).increment(1);
    histogram!("retry_backoff_duration_seconds", "error_type" => error_type)
        .record(backoff.as_secs_f64());
    debug!(
        error_type = error_type,
        backoff_ms = backoff.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record a throttling response
pub fn record_rate_limit(source: &str, daily_cap: bool) {
    counter!(
        "rate_limit_hits_total",
        "source" => source.to_string(),
        "daily_cap" => daily_cap.to_string(),
    )
    .increment(1);
}

/// Record the end of a run
pub fn record_run_finished(source: &str, status: &'static str) {
    counter!(
        "runs_finished_total",
        "source" => source.to_string(),
        "status" => status,
    )
    .increment(1);
}

/// Times one snapshot write
pub struct PersistTimer {
    start_time: Instant,
}

impl PersistTimer {
    /// Start timing
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Record the elapsed time
    pub fn record(self) {
        let elapsed = self.start_time.elapsed();
        histogram!("snapshot_persist_seconds").record(elapsed.as_secs_f64());
        debug!(duration_ms = elapsed.as_millis() as u64, "Snapshot persisted");
    }
}
