//! Validation subcommand

use super::CliError;
use crate::resume::{RecordStore, ResumePaths, ResumeState};
use clap::Parser;
use std::path::PathBuf;

/// Validate command for checking a saved output and its checkpoint
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// Output JSON file to check
    #[arg(long, default_value = "players_profiles.json")]
    pub output: PathBuf,
}

impl ValidateCommand {
    /// Execute the validation command
    ///
    /// Missing files are reported but are not an error; unparseable or
    /// inconsistent files are.
    pub async fn execute(&self) -> Result<(), CliError> {
        let paths = ResumePaths::for_output(&self.output);
        let has_output = paths.output.exists();
        let has_checkpoint = paths.checkpoint.exists();

        match (has_output, has_checkpoint) {
            (false, false) => {
                println!("No saved state found at {}", paths.output.display());
                Ok(())
            }
            (true, false) => {
                let bytes = std::fs::read(&paths.output).map_err(|e| {
                    CliError::InvalidArgument(format!(
                        "Failed to read {}: {e}",
                        paths.output.display()
                    ))
                })?;
                let (store, _meta) = RecordStore::from_json_slice(&bytes).map_err(|e| {
                    CliError::InvalidArgument(format!(
                        "{} is not a valid record file: {e}",
                        paths.output.display()
                    ))
                })?;
                println!("Output: {} ({} records)", paths.output.display(), store.len());
                println!("No checkpoint found; a fetch will start from the first page");
                Ok(())
            }
            (false, true) => Err(CliError::InvalidArgument(format!(
                "Checkpoint {} exists but output {} is missing",
                paths.checkpoint.display(),
                paths.output.display()
            ))),
            (true, true) => {
                let state = ResumeState::load(&paths)?.ok_or_else(|| {
                    CliError::InvalidArgument("Saved state disappeared while reading".to_string())
                })?;
                let checkpoint = state.checkpoint();
                println!("Output: {}", paths.output.display());
                println!("  Source: {}", checkpoint.source());
                println!("  Records: {}", state.store().len());
                println!("  Pages fetched: {}", checkpoint.pages_fetched());
                if let Some(total) = checkpoint.total_pages() {
                    println!("  Total pages: {total}");
                }
                if checkpoint.is_completed() {
                    println!("  Status: complete");
                } else {
                    match checkpoint.next_cursor() {
                        Some(cursor) => println!("  Status: partial, resumes at {cursor}"),
                        None => println!("  Status: partial, resumes at the first page"),
                    }
                }
                Ok(())
            }
        }
    }
}
