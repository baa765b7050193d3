//! Resume state persistence and management
//!
//! A resume state is the pair (record store, checkpoint). Both files are
//! written atomically, store first, so the checkpoint on disk never runs
//! ahead of the records it describes.

use super::atomic::write_atomic;
use super::checkpoint::{Checkpoint, SCHEMA_VERSION};
use super::store::{RecordStore, StoreMeta};
use crate::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum allowed checkpoint file size (1 MB) to prevent memory exhaustion
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 1024 * 1024;

/// Locations of the files that make up a resume state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePaths {
    /// Record store (the output file)
    pub output: PathBuf,
    /// Checkpoint stored next to the output
    pub checkpoint: PathBuf,
    /// Advisory lock held for the duration of a run
    pub lock: PathBuf,
}

impl ResumePaths {
    /// Derive checkpoint and lock paths from the output path
    ///
    /// `players.json` → `players.checkpoint.json`, `players.lock`
    pub fn for_output(output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        Self {
            checkpoint: output.with_extension("checkpoint.json"),
            lock: output.with_extension("lock"),
            output,
        }
    }
}

/// Record store plus checkpoint for one output file
#[derive(Debug, Clone)]
pub struct ResumeState {
    store: RecordStore,
    checkpoint: Checkpoint,
}

impl ResumeState {
    /// Empty state positioned at the initial cursor
    pub fn fresh(source: &str, initial_cursor: Option<Cursor>, now: i64) -> Self {
        Self {
            store: RecordStore::new(),
            checkpoint: Checkpoint::start(source, initial_cursor, now),
        }
    }

    /// Accumulated records
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Take the accumulated records
    pub fn into_store(self) -> RecordStore {
        self.store
    }

    /// Current checkpoint
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Cursor of the next page to fetch
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.checkpoint.next_cursor()
    }

    /// Whether the end of data has been reached
    pub fn is_completed(&self) -> bool {
        self.checkpoint.is_completed()
    }

    /// Merge a fetched page and advance the checkpoint; returns records added
    pub fn apply_page<I>(
        &mut self,
        records: I,
        next_cursor: Option<Cursor>,
        total_pages: Option<u64>,
        now: i64,
    ) -> usize
    where
        I: IntoIterator<Item = crate::Record>,
    {
        let added = self.store.merge(records);
        self.checkpoint
            .advance(next_cursor, total_pages, self.store.len() as u64, now);
        added
    }

    /// Mark the checkpoint terminal
    pub fn mark_completed(&mut self, now: i64) {
        self.checkpoint.mark_completed(now);
    }

    fn store_meta(&self) -> StoreMeta {
        StoreMeta {
            source: self.checkpoint.source().to_string(),
            record_count: self.store.len() as u64,
            pages_fetched: self.checkpoint.pages_fetched(),
            total_pages: self.checkpoint.total_pages(),
            complete: self.checkpoint.is_completed(),
            saved_at: self.checkpoint.saved_at(),
        }
    }

    /// Persist store then checkpoint, each with an atomic replace
    pub fn save(&self, paths: &ResumePaths) -> Result<(), ResumeError> {
        debug!(
            output = %paths.output.display(),
            records = self.store.len(),
            next_cursor = ?self.checkpoint.next_cursor(),
            "Saving resume state"
        );

        let store_bytes = self
            .store
            .to_json_pretty(&self.store_meta())
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;
        write_atomic(&paths.output, &store_bytes)?;

        let mut checkpoint_bytes = serde_json::to_vec_pretty(&self.checkpoint)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;
        checkpoint_bytes.push(b'\n');
        write_atomic(&paths.checkpoint, &checkpoint_bytes)?;

        debug!(
            pages_fetched = self.checkpoint.pages_fetched(),
            completed = self.checkpoint.is_completed(),
            "Resume state saved"
        );
        Ok(())
    }

    /// Load a previously saved state.
    ///
    /// Returns `Ok(None)` when either file is absent. Any parse failure,
    /// schema mismatch or inconsistency between the two files is an error.
    pub fn load(paths: &ResumePaths) -> Result<Option<Self>, ResumeError> {
        if !paths.checkpoint.exists() || !paths.output.exists() {
            debug!("No resume state found");
            return Ok(None);
        }

        let metadata = std::fs::metadata(&paths.checkpoint)
            .map_err(|e| ResumeError::IoError(e.to_string()))?;
        if metadata.len() > MAX_CHECKPOINT_FILE_SIZE {
            return Err(ResumeError::StateTooLarge {
                size: metadata.len(),
                max: MAX_CHECKPOINT_FILE_SIZE,
            });
        }

        let contents = std::fs::read_to_string(&paths.checkpoint)
            .map_err(|e| ResumeError::IoError(e.to_string()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents)
            .map_err(|e| ResumeError::DeserializationError(format!("checkpoint: {e}")))?;

        if checkpoint.schema_version() != SCHEMA_VERSION {
            return Err(ResumeError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: checkpoint.schema_version().to_string(),
            });
        }

        let bytes =
            std::fs::read(&paths.output).map_err(|e| ResumeError::IoError(e.to_string()))?;
        let (store, _meta) = RecordStore::from_json_slice(&bytes)
            .map_err(|e| ResumeError::DeserializationError(format!("store: {e}")))?;

        // The store is written first, so it can only be at or ahead of the checkpoint
        if (store.len() as u64) < checkpoint.record_count() {
            return Err(ResumeError::Inconsistent(format!(
                "checkpoint expects {} records but store holds {}",
                checkpoint.record_count(),
                store.len()
            )));
        }

        Ok(Some(Self { store, checkpoint }))
    }

    /// Load a saved state for `source`, falling back to a fresh one.
    ///
    /// Unreadable state and state written by another source are treated as
    /// absent, with a warning.
    pub fn load_or_fresh(
        paths: &ResumePaths,
        source: &str,
        initial_cursor: Option<Cursor>,
        now: i64,
    ) -> Self {
        match Self::load(paths) {
            Ok(Some(state)) if state.checkpoint.source() == source => {
                info!(
                    next_cursor = ?state.next_cursor(),
                    records = state.store.len(),
                    pages_fetched = state.checkpoint.pages_fetched(),
                    completed = state.is_completed(),
                    "Resuming from checkpoint"
                );
                state
            }
            Ok(Some(state)) => {
                warn!(
                    found_source = %state.checkpoint.source(),
                    expected_source = %source,
                    "Checkpoint belongs to a different source, starting fresh"
                );
                Self::fresh(source, initial_cursor, now)
            }
            Ok(None) => {
                debug!("No checkpoint found, starting fresh");
                Self::fresh(source, initial_cursor, now)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load resume state, starting fresh");
                Self::fresh(source, initial_cursor, now)
            }
        }
    }
}

/// Errors related to resume state
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Checkpoint file too large
    #[error("checkpoint file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Store and checkpoint disagree
    #[error("inconsistent resume state: {0}")]
    Inconsistent(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}
