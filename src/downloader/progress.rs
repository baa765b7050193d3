//! Progress tracking for long-running fetches.
//!
//! Calculates page percentages and remaining time from the pages fetched in
//! the current run, and formats the per-page progress line logged by the
//! executor. Time values come from the injected clock.

use std::time::Duration;

/// Progress of one fetch run
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Pages fetched in total, including earlier runs
    pub pages_fetched: u64,
    /// Total pages reported by the endpoint
    pub total_pages: Option<u64>,
    /// Unique records held
    pub records: usize,
    /// Pages fetched since this run started
    pub pages_this_run: u64,
    /// Clock reading when the run started
    pub start: Duration,
}

impl ProgressState {
    /// Start tracking at clock reading `start`, from a resumed position
    pub fn new(start: Duration, pages_fetched: u64, total_pages: Option<u64>, records: usize) -> Self {
        Self {
            pages_fetched,
            total_pages,
            records,
            pages_this_run: 0,
            start,
        }
    }

    /// Account for one fetched page
    pub fn update(&mut self, total_pages: Option<u64>, records: usize) {
        self.pages_fetched = self.pages_fetched.saturating_add(1);
        self.pages_this_run = self.pages_this_run.saturating_add(1);
        if total_pages.is_some() {
            self.total_pages = total_pages;
        }
        self.records = records;
    }

    /// Completion percentage (0-100), when the total is known
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total_pages?;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.pages_fetched as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Remaining time at clock reading `now`, from this run's page rate
    pub fn estimate_remaining(&self, now: Duration) -> Option<Duration> {
        let total = self.total_pages?;
        if self.pages_this_run == 0 {
            return None;
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f64();
        let per_page = elapsed / self.pages_this_run as f64;
        let remaining_pages = total.saturating_sub(self.pages_fetched);
        Some(Duration::from_secs_f64(per_page * remaining_pages as f64))
    }

    /// Human-readable progress line
    pub fn format_progress(&self, now: Duration) -> String {
        let mut parts = vec![match self.total_pages {
            Some(total) => format!("page {}/{total}", self.pages_fetched),
            None => format!("page {}", self.pages_fetched),
        }];

        if let Some(pct) = self.percentage() {
            parts[0].push_str(&format!(" ({pct:.1}%)"));
        }

        parts.push(format!("{} records", self.records));

        if let Some(remaining) = self.estimate_remaining(now) {
            parts.push(format!("ETA {}", format_duration(remaining)));
        }

        parts.join(" | ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
