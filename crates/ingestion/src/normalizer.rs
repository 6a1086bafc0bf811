//! Raw record normalization.
//!
//! Maps provider or file records onto the fields the daily aggregation
//! needs. Malformed fields are defaulted; only an event without a usable
//! timestamp is dropped, since it cannot be assigned to a day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use imbalance_core::{Action, Calendar, NormalizedEvent, RawEvent, RawTimestamp, Side};
use serde::Serialize;
use tracing::debug;

/// Counters describing how raw records were normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    /// Records seen.
    pub seen: u64,
    /// Records turned into events.
    pub normalized: u64,
    /// Records dropped for a missing or unparsable timestamp.
    pub dropped_timestamp: u64,
    /// Records without a side.
    pub missing_side: u64,
    /// Records whose side text was not recognized.
    pub unknown_side: u64,
    /// Records without an action.
    pub missing_action: u64,
    /// Records whose action text was not recognized.
    pub unknown_action: u64,
    /// Records whose size was absent, negative or not finite.
    pub defaulted_size: u64,
    /// Records without a usable price.
    pub missing_price: u64,
}

impl NormalizationStats {
    /// Fraction of records dropped.
    pub fn drop_frac(&self) -> f64 {
        if self.seen > 0 {
            self.dropped_timestamp as f64 / self.seen as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Normalizer that buckets events into trading dates.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    calendar: Calendar,
    stats: NormalizationStats,
}

impl EventNormalizer {
    /// Create a normalizer using the given calendar.
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            stats: NormalizationStats::default(),
        }
    }

    /// Normalize one record. Returns `None` if it must be dropped.
    pub fn normalize(&mut self, raw: &RawEvent) -> Option<NormalizedEvent> {
        self.stats.seen += 1;

        let Some(date) = raw.ts_event.as_ref().and_then(|ts| self.event_date(ts)) else {
            self.stats.dropped_timestamp += 1;
            debug!(ts_event = ?raw.ts_event, "dropping event without a usable timestamp");
            return None;
        };

        let side = match raw.side.as_deref() {
            Some(text) => {
                if !Side::is_known(text) {
                    self.stats.unknown_side += 1;
                }
                Side::parse(text)
            }
            None => {
                self.stats.missing_side += 1;
                Side::None
            }
        };

        let action = match raw.action.as_deref() {
            Some(text) => {
                if !Action::is_known(text) {
                    self.stats.unknown_action += 1;
                }
                Action::parse(text)
            }
            None => {
                self.stats.missing_action += 1;
                Action::None
            }
        };

        let size = match raw.size {
            Some(size) if size.is_finite() && size >= 0.0 => size,
            _ => {
                self.stats.defaulted_size += 1;
                0.0
            }
        };

        let price = raw.price.filter(|p| p.is_finite());
        if price.is_none() {
            self.stats.missing_price += 1;
        }

        self.stats.normalized += 1;
        Some(NormalizedEvent {
            date,
            side,
            action,
            size,
            price,
        })
    }

    /// Trading date of a raw timestamp. A bare date is taken as-is; anything
    /// with a time of day is bucketed through the calendar.
    fn event_date(&self, ts: &RawTimestamp) -> Option<NaiveDate> {
        if let RawTimestamp::Text(text) = ts {
            if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                return Some(date);
            }
        }
        parse_timestamp(ts).map(|instant| self.calendar.date_of(instant))
    }

    /// Get normalization statistics.
    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

/// Parse a raw timestamp into a UTC instant.
///
/// Accepts integer nanoseconds (as a number or numeric text), RFC 3339,
/// `YYYY-MM-DD HH:MM:SS[.f][+HH:MM]` (UTC when no offset is given) and
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(ts: &RawTimestamp) -> Option<DateTime<Utc>> {
    match ts {
        RawTimestamp::Nanos(ns) => Some(DateTime::from_timestamp_nanos(*ns)),
        RawTimestamp::Text(text) => parse_timestamp_text(text.trim()),
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        if let Ok(ns) = text.parse::<i64>() {
            return Some(DateTime::from_timestamp_nanos(ns));
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAN1_NOON_NS: i64 = 1_704_110_400_000_000_000;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_record() {
        let mut normalizer = EventNormalizer::default();
        let raw = RawEvent::new(JAN1_NOON_NS, "Bid", "Add", 10.0, 100.5);

        let event = normalizer.normalize(&raw).unwrap();
        assert_eq!(event.date, date(2024, 1, 1));
        assert_eq!(event.side, Side::Bid);
        assert_eq!(event.action, Action::Add);
        assert_eq!(event.size, 10.0);
        assert_eq!(event.price, Some(100.5));
        assert_eq!(normalizer.stats().normalized, 1);
    }

    #[test]
    fn test_drops_missing_timestamp() {
        let mut normalizer = EventNormalizer::default();
        let mut raw = RawEvent::new(JAN1_NOON_NS, "Bid", "Add", 1.0, 1.0);
        raw.ts_event = None;
        assert!(normalizer.normalize(&raw).is_none());

        raw.ts_event = Some(RawTimestamp::from("not a time"));
        assert!(normalizer.normalize(&raw).is_none());

        let stats = normalizer.stats();
        assert_eq!(stats.seen, 2);
        assert_eq!(stats.dropped_timestamp, 2);
        assert_eq!(stats.normalized, 0);
        assert!((stats.drop_frac() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_defaults_missing_fields() {
        let mut normalizer = EventNormalizer::default();
        let raw = RawEvent {
            ts_event: Some(RawTimestamp::Nanos(JAN1_NOON_NS)),
            ..RawEvent::default()
        };

        let event = normalizer.normalize(&raw).unwrap();
        assert_eq!(event.side, Side::None);
        assert_eq!(event.action, Action::None);
        assert_eq!(event.size, 0.0);
        assert_eq!(event.price, None);

        let stats = normalizer.stats();
        assert_eq!(stats.missing_side, 1);
        assert_eq!(stats.missing_action, 1);
        assert_eq!(stats.defaulted_size, 1);
        assert_eq!(stats.missing_price, 1);
    }

    #[test]
    fn test_bad_numbers() {
        let mut normalizer = EventNormalizer::default();
        let raw = RawEvent::new(JAN1_NOON_NS, "ask", "cancel", -3.0, f64::NAN);
        let event = normalizer.normalize(&raw).unwrap();
        assert_eq!(event.size, 0.0);
        assert_eq!(event.price, None);
    }

    #[test]
    fn test_unknown_side_and_action() {
        let mut normalizer = EventNormalizer::default();
        let raw = RawEvent::new(JAN1_NOON_NS, "up", "replace", 1.0, 1.0);
        let event = normalizer.normalize(&raw).unwrap();
        assert_eq!(event.side, Side::None);
        assert_eq!(event.action, Action::None);
        assert_eq!(normalizer.stats().unknown_side, 1);
        assert_eq!(normalizer.stats().unknown_action, 1);

        let explicit = RawEvent::new(JAN1_NOON_NS, "N", "N", 1.0, 1.0);
        normalizer.normalize(&explicit).unwrap();
        assert_eq!(normalizer.stats().unknown_side, 1);
    }

    #[test]
    fn test_timestamp_forms() {
        let expected = DateTime::from_timestamp_nanos(JAN1_NOON_NS);
        for text in [
            "1704110400000000000",
            "2024-01-01T12:00:00Z",
            "2024-01-01T12:00:00.000000000+00:00",
            "2024-01-01 12:00:00",
            "2024-01-01 12:00:00.000+00:00",
            "2024-01-01T12:00:00",
        ] {
            assert_eq!(
                parse_timestamp(&RawTimestamp::from(text)),
                Some(expected),
                "{text}"
            );
        }
        assert_eq!(parse_timestamp(&RawTimestamp::from("")), None);
        assert_eq!(parse_timestamp(&RawTimestamp::from("18446744073709551615")), None);
    }

    #[test]
    fn test_calendar_offset_bucketing() {
        // 2024-01-02 03:00 UTC
        let ts = 1_704_164_400_000_000_000i64;
        let mut utc = EventNormalizer::default();
        let mut eastern = EventNormalizer::new(Calendar::from_offset_minutes(-300).unwrap());
        let raw = RawEvent::new(ts, "Bid", "Add", 1.0, 1.0);
        assert_eq!(utc.normalize(&raw).unwrap().date, date(2024, 1, 2));
        assert_eq!(eastern.normalize(&raw).unwrap().date, date(2024, 1, 1));

        let bare = RawEvent::new("2024-01-02", "Bid", "Add", 1.0, 1.0);
        assert_eq!(eastern.normalize(&bare).unwrap().date, date(2024, 1, 2));
    }
}
