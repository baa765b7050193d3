//! Main entry point for the player-data-downloader CLI

use clap::Parser;
use player_data_downloader::cli::{exit_code, Cli, Commands};
use player_data_downloader::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("player_data_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping after the current page...");
                shutdown.request_shutdown();
            }
        }
    });

    let result: anyhow::Result<i32> = match cli.command {
        Commands::Fetch(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map(|summary| exit_code(summary.status))
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Validate(ref validate_cmd) => validate_cmd
            .execute()
            .await
            .map(|()| 0)
            .map_err(|e| anyhow::anyhow!(e)),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
