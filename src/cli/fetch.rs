//! Fetch command implementation

use crate::downloader::{FetchConfig, FetchExecutor, RunReport, RunStatus, RunSummary};
use crate::fetcher::sources::{resolve_api_key, Source};
use crate::resume::ResumePaths;
use crate::shutdown::SharedShutdown;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::CliError;

/// Exit code for a run that reached the end of data
pub const EXIT_OK: i32 = 0;
/// Exit code for fatal errors
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a run that stopped early with progress saved (EX_TEMPFAIL)
pub const EXIT_PARTIAL: i32 = 75;

/// Process exit code for a finished run
pub fn exit_code(status: RunStatus) -> i32 {
    if status.is_complete() {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

/// Player Data Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "player-data-downloader")]
#[command(about = "Download paginated player listings with resumable checkpoints", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch all pages of a player listing, resuming from the last checkpoint
    Fetch(FetchArgs),

    /// Check a saved output and checkpoint
    Validate(super::ValidateCommand),
}

/// Fetch command arguments
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Listing API: api-sports or balldontlie
    #[arg(long, default_value = "api-sports")]
    pub source: Source,

    /// API key (defaults to the source's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL override (e.g., v3.football.api-sports.io)
    #[arg(long)]
    pub host: Option<String>,

    /// Output JSON file; the checkpoint is written next to it
    #[arg(long, default_value = "players_profiles.json")]
    pub output: PathBuf,

    /// Ignore any existing output and checkpoint and start from the first page
    #[arg(long, default_value_t = false)]
    pub fresh: bool,

    /// Sleep until the daily quota resets instead of stopping
    #[arg(long, default_value_t = false)]
    pub wait_for_reset: bool,

    /// With --wait-for-reset, give up after this many consecutive quota resets
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_reset_waits: Option<u32>,

    /// Maximum retries per page for transient errors (attempts = retries + 1)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Request budget; requests are spaced 60s / N apart
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=600))]
    pub requests_per_minute: u32,

    /// Items per page, for sources that accept a page size
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: u32,

    /// Consecutive empty pages that end the run
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_empty_pages: u32,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl FetchArgs {
    /// Run configuration described by these arguments
    pub fn to_config(&self) -> FetchConfig {
        FetchConfig {
            requests_per_minute: self.requests_per_minute,
            page_size: self.page_size,
            max_retries: self.max_retries,
            request_timeout: Duration::from_secs(self.timeout),
            max_empty_pages: self.max_empty_pages,
            fresh: self.fresh,
            wait_for_reset: self.wait_for_reset,
            max_reset_waits: self.max_reset_waits,
            ..FetchConfig::default()
        }
    }

    /// Execute the fetch and print the outcome
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<RunSummary, CliError> {
        let api_key = resolve_api_key(self.api_key.as_deref(), self.source).ok_or_else(|| {
            CliError::ConfigurationError(format!(
                "No API key for {}: pass --api-key or set {}",
                self.source,
                self.source.key_env_vars().join(" or ")
            ))
        })?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let config = self.to_config();
        let endpoint = self.source.endpoint(&api_key, self.host.as_deref(), &config)?;
        info!(
            source = %self.source,
            url = %endpoint.url(),
            output = %self.output.display(),
            "Starting player fetch"
        );

        let executor = FetchExecutor::new(config, ResumePaths::for_output(&self.output))
            .with_shutdown(shutdown);
        let report = executor.run(&endpoint).await?;

        match cli.output_format {
            OutputFormat::Json => output_json(&report)?,
            OutputFormat::Human => output_human(&report, &self.output),
        }
        Ok(report.summary())
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

fn output_json(report: &RunReport) -> Result<(), CliError> {
    let line = serde_json::to_string(&report.summary())
        .map_err(|e| CliError::InvalidArgument(format!("Failed to serialize summary: {e}")))?;
    println!("{line}");
    Ok(())
}

fn output_human(report: &RunReport, output: &std::path::Path) {
    match report.status {
        RunStatus::Completed => println!("\nFetch completed successfully!"),
        RunStatus::AlreadyComplete => println!("\nOutput is already complete, nothing fetched."),
        RunStatus::RetriesExhausted => println!("\nFetch stopped: retries exhausted."),
        RunStatus::DailyLimitReached => println!("\nFetch stopped: daily request quota reached."),
        RunStatus::Rejected => println!("\nFetch stopped: request rejected by the API."),
        RunStatus::Cancelled => println!("\nFetch cancelled."),
    }
    println!("Output: {}", output.display());
    println!("Records: {} ({} new)", report.store.len(), report.records_added);
    println!(
        "Pages fetched: {} (total {})",
        report.pages_fetched, report.total_pages_fetched
    );
    if report.retries > 0 {
        println!("Retries: {}", report.retries);
    }
    if let Some(error) = &report.error {
        println!("Last error: {error}");
    }
    if !report.status.is_complete() {
        match &report.next_cursor {
            Some(cursor) => println!("Re-run the same command to resume from {cursor}."),
            None => println!("Re-run the same command to resume."),
        }
    }
}
