//! Run outcome structures

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resume::RecordStore;
use crate::Cursor;

/// How a fetch run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// End of data reached in this run
    Completed,
    /// The checkpoint was already terminal; nothing was fetched
    AlreadyComplete,
    /// A page kept failing past the retry ceiling
    RetriesExhausted,
    /// The daily quota ran out and waiting was not enabled
    DailyLimitReached,
    /// The API refused the request (bad key, bad parameters)
    Rejected,
    /// Shutdown was requested
    Cancelled,
}

impl RunStatus {
    /// Whether the whole listing is on disk
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::AlreadyComplete)
    }

    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::AlreadyComplete => "already_complete",
            RunStatus::RetriesExhausted => "retries_exhausted",
            RunStatus::DailyLimitReached => "daily_limit_reached",
            RunStatus::Rejected => "rejected",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a fetch run
///
/// Every status except the fatal errors returned as `Err` leaves a
/// consistent snapshot on disk that the next run resumes from.
#[derive(Debug)]
pub struct RunReport {
    /// How the run ended
    pub status: RunStatus,
    /// Records held at the end of the run
    pub store: RecordStore,
    /// Pages fetched in this run
    pub pages_fetched: u64,
    /// Pages fetched across all runs
    pub total_pages_fetched: u64,
    /// Records first seen in this run
    pub records_added: usize,
    /// Retries performed in this run
    pub retries: u64,
    /// Where the next run starts (`None` when complete)
    pub next_cursor: Option<Cursor>,
    /// Last error, for runs that stopped early
    pub error: Option<String>,
}

impl RunReport {
    /// Serializable summary without the records
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            status: self.status,
            records: self.store.len(),
            records_added: self.records_added,
            pages_fetched: self.pages_fetched,
            total_pages_fetched: self.total_pages_fetched,
            retries: self.retries,
            next_cursor: self.next_cursor.clone(),
            error: self.error.clone(),
        }
    }
}

/// Record-free view of a [`RunReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// How the run ended
    pub status: RunStatus,
    /// Unique records on disk
    pub records: usize,
    /// Records first seen in this run
    pub records_added: usize,
    /// Pages fetched in this run
    pub pages_fetched: u64,
    /// Pages fetched across all runs
    pub total_pages_fetched: u64,
    /// Retries performed in this run
    pub retries: u64,
    /// Where the next run starts
    pub next_cursor: Option<Cursor>,
    /// Last error, for runs that stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
