//! End-to-end runs of the retrieval driver over in-memory providers.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use imbalance_core::{Config, Correlation, DateWindow, RawEvent};
use imbalance_retrieval::{InMemoryProvider, Progress, RetrievalDriver};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn ts(day: u32) -> String {
    format!("2024-01-{day:02}T14:30:00Z")
}

fn config(chunk_days: u32, prefetch: bool) -> Config {
    let mut config = Config::default();
    config.retrieval.chunk_days = chunk_days;
    config.retrieval.prefetch = prefetch;
    config
}

/// Ten days of activity with distinct volumes and a rising price.
fn ten_day_provider() -> InMemoryProvider {
    let mut provider = InMemoryProvider::new();
    for day in 1..=10u32 {
        let t = ts(day);
        provider.push(d(day), RawEvent::new(t.as_str(), "B", "A", 10.0 + day as f64, 100.0));
        provider.push(d(day), RawEvent::new(t.as_str(), "A", "A", 5.0, 100.0));
        provider.push(d(day), RawEvent::new(t.as_str(), "A", "T", 1.0, 100.0 + day as f64));
    }
    provider
}

#[test]
fn test_two_day_scenario() {
    let provider = InMemoryProvider::new()
        .with_event(d(1), RawEvent::new(ts(1).as_str(), "Bid", "Add", 10.0, 100.0))
        .with_event(d(1), RawEvent::new(ts(1).as_str(), "Ask", "Add", 4.0, 100.0))
        .with_event(d(2), RawEvent::new(ts(2).as_str(), "Bid", "Trade", 3.0, 105.0));
    let driver = RetrievalDriver::new(provider, &config(7, false)).unwrap();

    let output = driver.run("ESH4", d(1), d(2), |_| {}).unwrap();
    assert!(output.report.is_complete());
    assert_eq!(output.report.events_fed, 3);

    let summary = output.summary();
    assert_eq!(summary.rows.len(), 2);

    let day1 = &summary.rows[0];
    assert_eq!(day1.date, d(1));
    assert_relative_eq!(day1.bid_volume, 10.0);
    assert_relative_eq!(day1.ask_volume, 4.0);
    assert_relative_eq!(day1.imbalance.unwrap(), 6.0 / 14.0);
    assert_eq!(day1.price, Some(100.0));
    assert_eq!(day1.price_change, None);

    // Each day starts from zero volume, so the trade clamps the bid at 0.
    let day2 = &summary.rows[1];
    assert_eq!(day2.date, d(2));
    assert_eq!(day2.bid_volume, 0.0);
    assert_eq!(day2.ask_volume, 0.0);
    assert_eq!(day2.imbalance, None);
    assert_eq!(day2.price, Some(105.0));
    assert_relative_eq!(day2.price_change.unwrap(), 0.05, epsilon = 1e-12);
    assert_eq!(summary.correlation, Correlation::InsufficientData { pairs: 0 });
}

#[test]
fn test_failed_window_is_absent_and_neighbors_intact() {
    let provider = ten_day_provider().fail_on(d(5));
    let driver = RetrievalDriver::new(provider, &config(3, false)).unwrap();

    let output = driver.run("ESH4", d(1), d(10), |_| {}).unwrap();
    let report = &output.report;
    assert_eq!(report.windows_total, 4);
    assert_eq!(report.windows_succeeded, 3);
    assert_eq!(report.failed_windows.len(), 1);
    assert_eq!(report.failed_windows[0].window, DateWindow::new(d(4), d(6)));
    assert!(!report.is_complete());
    assert!(report.is_date_missing(d(5)));

    let dates: Vec<NaiveDate> = output.aggregator.days().map(|(date, _)| date).collect();
    assert_eq!(dates, vec![d(1), d(2), d(3), d(7), d(8), d(9), d(10)]);

    let day3 = output.aggregator.day(d(3)).unwrap();
    assert_relative_eq!(day3.bid_volume, 13.0);
    assert_relative_eq!(day3.ask_volume, 4.0);
    assert_eq!(day3.last_price, Some(103.0));
    let day7 = output.aggregator.day(d(7)).unwrap();
    assert_relative_eq!(day7.bid_volume, 17.0);
}

#[test]
fn test_midstream_failure_feeds_nothing_from_window() {
    let provider = ten_day_provider().fail_midstream(d(2), 2);
    let driver = RetrievalDriver::new(provider, &config(2, false)).unwrap();

    let output = driver.run("ESH4", d(1), d(4), |_| {}).unwrap();
    assert_eq!(output.report.failed_windows.len(), 1);
    assert!(output.aggregator.day(d(1)).is_none());
    assert!(output.aggregator.day(d(2)).is_none());
    assert!(output.aggregator.day(d(3)).is_some());
    assert_eq!(output.report.events_fed, 6);
}

#[test]
fn test_chunk_size_does_not_change_results() {
    let baseline = RetrievalDriver::new(ten_day_provider(), &config(10, false))
        .unwrap()
        .run("ESH4", d(1), d(10), |_| {})
        .unwrap()
        .summary();

    for chunk_days in [1, 2, 3, 7] {
        let summary = RetrievalDriver::new(ten_day_provider(), &config(chunk_days, false))
            .unwrap()
            .run("ESH4", d(1), d(10), |_| {})
            .unwrap()
            .summary();
        assert_eq!(summary, baseline, "chunk_days = {chunk_days}");
    }
}

#[test]
fn test_prefetch_matches_sequential() {
    let provider = ten_day_provider().fail_on(d(8));
    let sequential = RetrievalDriver::new(&provider, &config(2, false))
        .unwrap()
        .run("ESH4", d(1), d(10), |_| {})
        .unwrap();
    let prefetched = RetrievalDriver::new(&provider, &config(2, false))
        .unwrap()
        .with_prefetch(true)
        .run("ESH4", d(1), d(10), |_| {})
        .unwrap();

    assert_eq!(prefetched.summary(), sequential.summary());
    assert_eq!(prefetched.report.failed_windows, sequential.report.failed_windows);
    assert_eq!(prefetched.report.events_fed, sequential.report.events_fed);
    assert_eq!(prefetched.report.normalization, sequential.report.normalization);
}

#[test]
fn test_progress_once_per_window() {
    let driver = RetrievalDriver::new(ten_day_provider().fail_on(d(2)), &config(1, true)).unwrap();

    let mut seen: Vec<Progress> = Vec::new();
    let output = driver.run("ESH4", d(1), d(3), |p| seen.push(*p)).unwrap();

    assert_eq!(output.report.windows_total, 3);
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen.iter().map(|p| p.completed).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        seen.iter().map(|p| p.succeeded).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert_eq!(seen[1].window, DateWindow::new(d(2), d(2)));
    assert_relative_eq!(seen[2].fraction(), 1.0);
}

#[test]
fn test_single_day_range() {
    let driver = RetrievalDriver::new(ten_day_provider(), &config(7, false)).unwrap();
    let output = driver.run("ESH4", d(4), d(4), |_| {}).unwrap();

    assert_eq!(output.report.windows_total, 1);
    assert_eq!(output.aggregator.day_count(), 1);
    assert!(output.aggregator.day(d(4)).is_some());
}

#[test]
fn test_normalization_counts_reach_report() {
    let mut bad = RawEvent::new(ts(1).as_str(), "Bid", "Add", 1.0, 1.0);
    bad.ts_event = None;
    let provider = InMemoryProvider::new()
        .with_event(d(1), RawEvent::new(ts(1).as_str(), "Bid", "Add", 1.0, 1.0))
        .with_event(d(1), bad);
    let driver = RetrievalDriver::new(provider, &config(7, false)).unwrap();

    let report = driver.run("ESH4", d(1), d(2), |_| {}).unwrap().report;
    assert_eq!(report.events_received, 2);
    assert_eq!(report.events_fed, 1);
    assert_eq!(report.normalization.dropped_timestamp, 1);
}

#[test]
fn test_repeated_runs_are_identical() {
    let provider = ten_day_provider();
    let driver = RetrievalDriver::new(&provider, &config(4, false)).unwrap();
    let first = driver.run("ESH4", d(1), d(10), |_| {}).unwrap().summary();
    let second = driver.run("ESH4", d(1), d(10), |_| {}).unwrap().summary();
    assert_eq!(first, second);
    assert!(matches!(first.correlation, Correlation::Value(_) | Correlation::Undefined));
}
