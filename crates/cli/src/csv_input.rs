//! Daily summary of an order-event CSV.

use std::io::Read;

use anyhow::{bail, Context, Result};
use imbalance_core::{Calendar, DailySummary};
use imbalance_features::{DailyAggregator, MetricsFinalizer};
use imbalance_ingestion::{CsvColumns, CsvEventSource, EventNormalizer, NormalizationStats};
use tracing::{info, warn};

/// Summary of a CSV plus how its rows were normalized.
#[derive(Debug)]
pub struct CsvSummary {
    pub summary: DailySummary,
    pub stats: NormalizationStats,
}

/// Normalize, aggregate and finalize every row of a headered CSV.
///
/// Fails when the file has rows but none of them has a usable timestamp.
/// A header-only file gives an empty summary.
pub fn summarize_csv<R: Read>(
    reader: R,
    columns: &CsvColumns,
    calendar: Calendar,
) -> Result<CsvSummary> {
    let source = CsvEventSource::from_reader(reader, columns).context("reading CSV header")?;
    if !source.has_timestamp_column() {
        warn!(column = %columns.ts_event, "timestamp column not found; every row will be dropped");
    }

    let mut normalizer = EventNormalizer::new(calendar);
    let mut aggregator = DailyAggregator::new();
    for raw in source {
        let raw = raw.context("reading CSV row")?;
        if let Some(event) = normalizer.normalize(&raw) {
            aggregator.apply(&event);
        }
    }

    let stats = *normalizer.stats();
    info!(
        rows = stats.seen,
        used = stats.normalized,
        dropped = stats.dropped_timestamp,
        days = aggregator.day_count(),
        "csv aggregated"
    );
    if stats.seen > 0 && stats.normalized == 0 {
        bail!(
            "none of {} row(s) had a usable {:?} timestamp",
            stats.seen,
            columns.ts_event
        );
    }

    Ok(CsvSummary {
        summary: MetricsFinalizer::new().finalize(aggregator.finalize()),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use imbalance_core::Correlation;

    #[test]
    fn test_all_rows_dropped_is_error() {
        let data = "ts_event,side,action,size,price\nnot a time,Bid,Add,1,100\n,Ask,Add,2,100\n";
        let err = summarize_csv(data.as_bytes(), &CsvColumns::default(), Calendar::utc())
            .unwrap_err();
        assert!(err.to_string().contains("2 row(s)"));
    }

    #[test]
    fn test_missing_timestamp_column_is_error() {
        let data = "time,side,action,size,price\n2024-01-01,Bid,Add,1,100\n";
        assert!(summarize_csv(data.as_bytes(), &CsvColumns::default(), Calendar::utc()).is_err());
    }

    #[test]
    fn test_header_only_is_empty() {
        let data = "ts_event,side,action,size,price\n";
        let out = summarize_csv(data.as_bytes(), &CsvColumns::default(), Calendar::utc()).unwrap();
        assert!(out.summary.rows.is_empty());
        assert_eq!(out.summary.correlation, Correlation::InsufficientData { pairs: 0 });
        assert_eq!(out.stats.seen, 0);
    }

    #[test]
    fn test_mixed_rows() {
        let data = "\
ts_event,side,action,size,price
2024-01-01T10:00:00Z,Bid,Add,10,100
2024-01-01T11:00:00Z,Ask,Add,4,100
garbage,Bid,Add,99,1
2024-01-02T10:00:00Z,Bid,Add,3,105
2024-01-02T10:05:00Z,Ask,Cancel,1,
";
        let out = summarize_csv(data.as_bytes(), &CsvColumns::default(), Calendar::utc()).unwrap();

        assert_eq!(out.stats.seen, 5);
        assert_eq!(out.stats.normalized, 4);
        assert_eq!(out.stats.dropped_timestamp, 1);

        let rows = &out.summary.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((rows[0].bid_volume - 10.0).abs() < 1e-10);
        assert!((rows[0].ask_volume - 4.0).abs() < 1e-10);
        assert!((rows[0].imbalance.unwrap() - 6.0 / 14.0).abs() < 1e-10);
        assert_eq!(rows[0].price_change, None);

        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((rows[1].imbalance.unwrap() - 1.0).abs() < 1e-10);
        assert_eq!(rows[1].price, Some(105.0));
        assert!((rows[1].price_change.unwrap() - 0.05).abs() < 1e-10);
    }
}
