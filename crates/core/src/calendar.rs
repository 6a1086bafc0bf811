//! Day bucketing.
//!
//! Event timestamps are nanoseconds since the Unix epoch (UTC). A calendar
//! maps them to trading dates using a fixed UTC offset, and maps a date back
//! to the instant its day starts for provider queries.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// Fixed-offset trading calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    /// UTC calendar.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar shifted east of UTC by `minutes` (negative for west).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| {
                Error::config(format!("UTC offset of {minutes} minutes is out of range"))
            })
    }

    /// Trading date of a nanosecond epoch timestamp.
    #[inline]
    pub fn date_of_nanos(&self, ts_ns: i64) -> NaiveDate {
        self.date_of(DateTime::from_timestamp_nanos(ts_ns))
    }

    /// Trading date of a UTC instant.
    #[inline]
    pub fn date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Instant at which `date` begins on this calendar.
    pub fn day_start(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        date.and_time(NaiveTime::MIN)
            .and_local_timezone(self.offset)
            .single()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
