//! Core data types for the order-imbalance system.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size/quantity type.
pub type Size = f64;

/// Inclusive range of calendar dates retrieved and aggregated as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateWindow {
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window. `start` must not be after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "window start {start} after end {end}");
        Self { start, end }
    }

    /// Number of calendar days covered.
    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// Check whether a date falls inside the window.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First date after the window, i.e. the exclusive end of a provider query.
    pub fn end_exclusive(&self) -> Option<NaiveDate> {
        self.end.checked_add_days(Days::new(1))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Order side of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy order.
    Bid,
    /// Sell order.
    Ask,
    /// Absent or unrecognized side. Contributes to neither volume.
    None,
}

impl Side {
    /// Parse a raw side, case-insensitively. Accepts full names and
    /// single-letter codes (`B`, `A`, `N`). Anything else is `Side::None`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bid" | "b" | "buy" => Side::Bid,
            "ask" | "a" | "sell" => Side::Ask,
            _ => Side::None,
        }
    }

    /// Whether the raw text named a side this system tracks or the explicit
    /// "none" marker.
    pub fn is_known(raw: &str) -> bool {
        Self::parse(raw) != Side::None
            || matches!(raw.trim().to_ascii_lowercase().as_str(), "none" | "n")
    }
}

/// Order book action of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// New resting order.
    Add,
    /// Order removed.
    Cancel,
    /// Order changed. Aggregated additively, without the previous size.
    Modify,
    /// Trade print.
    Trade,
    /// Fill of a resting order.
    Fill,
    /// Book reset.
    ClearBook,
    /// Absent or unrecognized action. No volume change.
    None,
}

impl Action {
    /// Parse a raw action, case-insensitively. Accepts full names and
    /// single-letter codes (`A`, `C`, `M`, `T`, `F`, `R`). Anything else is
    /// `Action::None`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" | "a" => Action::Add,
            "cancel" | "c" => Action::Cancel,
            "modify" | "m" => Action::Modify,
            "trade" | "t" => Action::Trade,
            "fill" | "f" => Action::Fill,
            "clearbook" | "clear_book" | "clear" | "r" => Action::ClearBook,
            _ => Action::None,
        }
    }

    /// Whether the raw text named an action or the explicit "none" marker.
    pub fn is_known(raw: &str) -> bool {
        Self::parse(raw) != Action::None
            || matches!(raw.trim().to_ascii_lowercase().as_str(), "none" | "n")
    }
}

/// Event timestamp as delivered by a record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Nanoseconds since the Unix epoch.
    Nanos(i64),
    /// Textual timestamp (numeric nanoseconds, RFC 3339 or a plain date).
    Text(String),
}

impl From<i64> for RawTimestamp {
    fn from(ts_ns: i64) -> Self {
        RawTimestamp::Nanos(ts_ns)
    }
}

impl From<&str> for RawTimestamp {
    fn from(text: &str) -> Self {
        RawTimestamp::Text(text.to_string())
    }
}

/// A record as delivered by a provider or file, before normalization.
///
/// Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event timestamp.
    pub ts_event: Option<RawTimestamp>,
    /// Side text.
    pub side: Option<String>,
    /// Action text.
    pub action: Option<String>,
    /// Order size.
    pub size: Option<f64>,
    /// Order price.
    pub price: Option<f64>,
}

impl RawEvent {
    /// Create a fully populated raw event.
    pub fn new(
        ts_event: impl Into<RawTimestamp>,
        side: &str,
        action: &str,
        size: f64,
        price: f64,
    ) -> Self {
        Self {
            ts_event: Some(ts_event.into()),
            side: Some(side.to_string()),
            action: Some(action.to_string()),
            size: Some(size),
            price: Some(price),
        }
    }
}

/// An event reduced to what the daily aggregation needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Trading date.
    pub date: NaiveDate,
    /// Side.
    pub side: Side,
    /// Action.
    pub action: Action,
    /// Size (non-negative).
    pub size: Size,
    /// Price, if the event carried one.
    pub price: Option<f64>,
}

/// Running aggregate for one trading date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayState {
    /// Aggregate bid volume (never negative).
    pub bid_volume: Size,
    /// Aggregate ask volume (never negative).
    pub ask_volume: Size,
    /// Last price observed on this date.
    pub last_price: Option<f64>,
}

/// One row of the daily summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    /// Trading date.
    pub date: NaiveDate,
    /// Bid volume at end of day.
    pub bid_volume: Size,
    /// Ask volume at end of day.
    pub ask_volume: Size,
    /// Last price of the day.
    pub price: Option<f64>,
    /// (bid - ask) / (bid + ask); absent when both volumes are zero.
    pub imbalance: Option<f64>,
    /// price / previous row's price - 1; absent on the first row.
    pub price_change: Option<f64>,
}

impl DailyRow {
    /// Row carrying a day's state, derived columns unset.
    pub fn from_state(date: NaiveDate, state: &DayState) -> Self {
        Self {
            date,
            bid_volume: state.bid_volume,
            ask_volume: state.ask_volume,
            price: state.last_price,
            imbalance: None,
            price_change: None,
        }
    }
}

/// Correlation between imbalance and price change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Correlation {
    /// Pearson correlation coefficient.
    Value(f64),
    /// Enough pairs, but one series has zero variance.
    Undefined,
    /// Fewer than two rows with both columns defined.
    InsufficientData { pairs: usize },
}

impl Correlation {
    /// The coefficient, if there is one.
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Value(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Value(r) => write!(f, "{r:.2}"),
            Correlation::Undefined => write!(f, "undefined (zero variance)"),
            Correlation::InsufficientData { pairs } => {
                write!(f, "insufficient data ({pairs} usable day(s))")
            }
        }
    }
}

/// Finalized daily table plus its correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Rows in ascending date order.
    pub rows: Vec<DailyRow>,
    /// Imbalance / price change correlation.
    pub correlation: Correlation,
}
