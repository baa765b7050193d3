//! Advisory run lock
//!
//! Keeps two runs from writing the same output file at once, using fd-lock.

use super::state::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Lock file handle for one output
pub struct RunLock {
    lock: RwLock<File>,
}

impl RunLock {
    /// Open (creating if needed) the lock file at `path`
    pub fn open(path: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            lock: RwLock::new(file),
        })
    }

    /// Take the exclusive lock without blocking.
    ///
    /// The lock is held until the returned guard is dropped.
    pub fn try_exclusive(&mut self) -> Result<RwLockWriteGuard<'_, File>, ResumeError> {
        self.lock.try_write().map_err(|e| {
            ResumeError::LockError(format!("Another run holds the lock: {e}"))
        })
    }
}
