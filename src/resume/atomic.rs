//! Atomic file replacement
//!
//! Content is staged in a temporary file in the target's directory, flushed
//! and synced, then renamed over the target. A reader of the target path sees
//! either the previous complete file or the new complete file.

use super::state::ResumeError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Content written to a temporary file but not yet visible at its target path
pub struct StagedWrite {
    temp_file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `contents` to a synced temporary file next to `target`
    pub fn stage(target: &Path, contents: &[u8]) -> Result<Self, ResumeError> {
        let parent_dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent_dir).map_err(|e| {
            ResumeError::IoError(format!(
                "Failed to create directory {}: {e}",
                parent_dir.display()
            ))
        })?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(contents)
            .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;

        // Flush buffer to OS and sync to disk before the rename makes it visible
        temp_file
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;

        Ok(Self {
            temp_file,
            target: target.to_path_buf(),
        })
    }

    /// Path of the staged temporary file
    pub fn temp_path(&self) -> &Path {
        self.temp_file.path()
    }

    /// Rename the staged file over the target and sync the directory entry
    pub fn commit(self) -> Result<(), ResumeError> {
        let target = self.target;
        self.temp_file.persist(&target).map_err(|e| {
            ResumeError::IoError(format!(
                "Failed to persist temp file to {}: {e}",
                target.display()
            ))
        })?;

        // Fsync parent directory so the rename itself is durable
        if let Some(parent) = target.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(path = %target.display(), "Atomic write committed");
        Ok(())
    }
}

/// Atomically replace `target` with `contents`
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), ResumeError> {
    StagedWrite::stage(target, contents)?.commit()
}
