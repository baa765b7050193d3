//! Pagination checkpoint
//!
//! Records where the next page begins. A checkpoint is always written after
//! the store snapshot it describes, so resuming from it never skips records.

use crate::Cursor;
use serde::{Deserialize, Serialize};

/// Current checkpoint schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Durable record of pagination progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    schema_version: String,
    source: String,
    /// `null` once the run has completed
    next_cursor: Option<Cursor>,
    total_pages: Option<u64>,
    pages_fetched: u64,
    record_count: u64,
    completed: bool,
    saved_at: i64,
}

impl Checkpoint {
    /// Checkpoint for a run that has not fetched anything yet
    pub fn start(source: impl Into<String>, initial_cursor: Option<Cursor>, now: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source: source.into(),
            next_cursor: initial_cursor,
            total_pages: None,
            pages_fetched: 0,
            record_count: 0,
            completed: false,
            saved_at: now,
        }
    }

    /// Advance past a successfully fetched page
    ///
    /// A total reported by an earlier page is kept when the current page
    /// does not report one.
    pub fn advance(
        &mut self,
        next_cursor: Option<Cursor>,
        total_pages: Option<u64>,
        record_count: u64,
        now: i64,
    ) {
        self.next_cursor = next_cursor;
        if total_pages.is_some() {
            self.total_pages = total_pages;
        }
        self.pages_fetched += 1;
        self.record_count = record_count;
        self.saved_at = now;
    }

    /// Clear the cursor to the terminal sentinel
    pub fn mark_completed(&mut self, now: i64) {
        self.next_cursor = None;
        self.completed = true;
        self.saved_at = now;
    }

    /// Schema version the checkpoint was written with
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Source name the checkpoint belongs to
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Where the next page begins; `None` after completion
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Total pages as last reported by the endpoint
    pub fn total_pages(&self) -> Option<u64> {
        self.total_pages
    }

    /// Pages successfully fetched and persisted, across all resumed runs
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Store size at the time of the checkpoint
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Whether the end of data was reached
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Unix seconds of the last save
    pub fn saved_at(&self) -> i64 {
        self.saved_at
    }
}
