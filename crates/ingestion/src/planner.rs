//! Retrieval window planning.
//!
//! Splits an inclusive date range into consecutive windows of at most
//! `chunk_days` calendar days, so that only one window's events need to be
//! resident at a time.

use chrono::{Days, NaiveDate};
use imbalance_core::{DateWindow, Error, Result};

/// Planner for bounded retrieval windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    chunk_days: u32,
}

impl ChunkPlanner {
    /// Create a planner. `chunk_days` must be at least 1.
    pub fn new(chunk_days: u32) -> Result<Self> {
        if chunk_days == 0 {
            return Err(Error::config("chunk_days must be at least 1"));
        }
        Ok(Self { chunk_days })
    }

    /// Calendar days per window.
    pub fn chunk_days(&self) -> u32 {
        self.chunk_days
    }

    /// Plan windows covering `[start, end]`.
    ///
    /// Windows are ascending and non-overlapping; each one starts the day
    /// after the previous one ends, and the last one ends on `end`.
    /// Requires `start < end`.
    pub fn plan(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DateWindow>> {
        if start >= end {
            return Err(Error::InvalidRange { start, end });
        }

        let span = Days::new(u64::from(self.chunk_days - 1));
        let mut windows = Vec::new();
        let mut current = start;

        loop {
            let window_end = current
                .checked_add_days(span)
                .map_or(end, |d| d.min(end));
            windows.push(DateWindow::new(current, window_end));

            match window_end.succ_opt() {
                Some(next) if next <= end => current = next,
                _ => break,
            }
        }

        Ok(windows)
    }
}

/// Plan windows covering `[start, end]` with `chunk_days` days per window.
pub fn plan(start: NaiveDate, end: NaiveDate, chunk_days: u32) -> Result<Vec<DateWindow>> {
    ChunkPlanner::new(chunk_days)?.plan(start, end)
}
