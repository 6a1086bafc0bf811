//! PyO3 bindings for the order-imbalance Rust components.
//!
//! Exposes to Python:
//! - Daily aggregation of order events (raw or already normalized)
//! - Imbalance / price change finalization and correlation
//! - Retrieval window planning

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use imbalance_core::{
    Action, Calendar, Correlation, DailyRow as RustDailyRow, DailySummary as RustDailySummary,
    Error as RustError, RawEvent, RawTimestamp, Side,
};
use imbalance_features::{DailyAggregator, MetricsFinalizer};
use imbalance_ingestion::{ChunkPlanner, EventNormalizer};
use imbalance_retrieval::plan_range;

fn to_py_err(e: RustError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_date(text: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| PyValueError::new_err(format!("invalid date {text:?}: {e}")))
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One day of the daily table.
#[pyclass]
#[derive(Clone)]
pub struct DailyRow {
    /// ISO date (YYYY-MM-DD).
    #[pyo3(get)]
    pub date: String,
    #[pyo3(get)]
    pub bid_volume: f64,
    #[pyo3(get)]
    pub ask_volume: f64,
    #[pyo3(get)]
    pub price: Option<f64>,
    #[pyo3(get)]
    pub imbalance: Option<f64>,
    #[pyo3(get)]
    pub price_change: Option<f64>,
}

#[pymethods]
impl DailyRow {
    fn __repr__(&self) -> String {
        format!(
            "DailyRow(date={}, bid_volume={}, ask_volume={}, price={:?}, imbalance={:?}, price_change={:?})",
            self.date, self.bid_volume, self.ask_volume, self.price, self.imbalance, self.price_change
        )
    }
}

impl From<RustDailyRow> for DailyRow {
    fn from(r: RustDailyRow) -> Self {
        DailyRow {
            date: r.date.to_string(),
            bid_volume: r.bid_volume,
            ask_volume: r.ask_volume,
            price: r.price,
            imbalance: r.imbalance,
            price_change: r.price_change,
        }
    }
}

/// Finalized daily table with its correlation.
#[pyclass]
#[derive(Clone)]
pub struct DailySummary {
    #[pyo3(get)]
    pub rows: Vec<DailyRow>,
    /// Pearson coefficient, or `None` when it is not defined.
    #[pyo3(get)]
    pub correlation: Option<f64>,
    /// "value", "undefined" or "insufficient_data".
    #[pyo3(get)]
    pub correlation_status: String,
    /// Days with both imbalance and price change defined, when too few.
    #[pyo3(get)]
    pub usable_pairs: Option<usize>,
}

#[pymethods]
impl DailySummary {
    fn __len__(&self) -> usize {
        self.rows.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "DailySummary(days={}, correlation={:?}, status={})",
            self.rows.len(),
            self.correlation,
            self.correlation_status
        )
    }
}

impl From<RustDailySummary> for DailySummary {
    fn from(s: RustDailySummary) -> Self {
        let (status, pairs) = match s.correlation {
            Correlation::Value(_) => ("value", None),
            Correlation::Undefined => ("undefined", None),
            Correlation::InsufficientData { pairs } => ("insufficient_data", Some(pairs)),
        };
        DailySummary {
            correlation: s.correlation.value(),
            correlation_status: status.to_string(),
            usable_pairs: pairs,
            rows: s.rows.into_iter().map(DailyRow::from).collect(),
        }
    }
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Daily order-flow aggregator.
#[pyclass]
pub struct PyDailyAggregator {
    inner: DailyAggregator,
    normalizer: EventNormalizer,
}

#[pymethods]
impl PyDailyAggregator {
    #[new]
    #[pyo3(signature = (utc_offset_minutes=0))]
    fn new(utc_offset_minutes: i32) -> PyResult<Self> {
        let calendar = Calendar::from_offset_minutes(utc_offset_minutes).map_err(to_py_err)?;
        Ok(PyDailyAggregator {
            inner: DailyAggregator::new(),
            normalizer: EventNormalizer::new(calendar),
        })
    }

    /// Apply one event to the given date ("YYYY-MM-DD").
    #[pyo3(signature = (date, side, size, action, price=None))]
    fn update(
        &mut self,
        date: &str,
        side: &str,
        size: f64,
        action: &str,
        price: Option<f64>,
    ) -> PyResult<()> {
        let date = parse_date(date)?;
        self.inner
            .update(date, Side::parse(side), size, Action::parse(action), price);
        Ok(())
    }

    /// Normalize a raw record and apply it. `ts_event` is integer epoch
    /// nanoseconds or a date/time string. Returns False if the record was
    /// dropped for lack of a usable timestamp.
    #[pyo3(signature = (ts_event, side=None, action=None, size=None, price=None))]
    fn normalize_and_update(
        &mut self,
        ts_event: &Bound<'_, PyAny>,
        side: Option<String>,
        action: Option<String>,
        size: Option<f64>,
        price: Option<f64>,
    ) -> PyResult<bool> {
        let ts_event = if let Ok(ns) = ts_event.extract::<i64>() {
            RawTimestamp::Nanos(ns)
        } else if let Ok(text) = ts_event.extract::<String>() {
            RawTimestamp::Text(text)
        } else {
            return Err(PyValueError::new_err("ts_event must be int nanoseconds or str"));
        };

        let raw = RawEvent {
            ts_event: Some(ts_event),
            side,
            action,
            size,
            price,
        };
        match self.normalizer.normalize(&raw) {
            Some(event) => {
                self.inner.apply(&event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Daily rows without derived columns.
    fn finalize(&self) -> Vec<DailyRow> {
        self.inner.finalize().into_iter().map(|r| r.into()).collect()
    }

    /// Daily rows with imbalance, price change and correlation.
    fn summarize(&self) -> DailySummary {
        MetricsFinalizer::new().finalize(self.inner.finalize()).into()
    }

    /// Number of dates observed.
    fn day_count(&self) -> usize {
        self.inner.day_count()
    }

    /// Number of events applied.
    fn event_count(&self) -> u64 {
        self.inner.event_count()
    }

    /// Normalization counters: (seen, normalized, dropped_timestamp).
    fn stats(&self) -> (u64, u64, u64) {
        let s = self.normalizer.stats();
        (s.seen, s.normalized, s.dropped_timestamp)
    }

    /// Clear all state.
    fn clear(&mut self) {
        self.inner.clear();
        self.normalizer.reset_stats();
    }
}

/// Plan retrieval windows over an inclusive date range.
///
/// Returns (start, end) ISO date pairs.
#[pyfunction]
fn plan_windows(start: &str, end: &str, chunk_days: u32) -> PyResult<Vec<(String, String)>> {
    let planner = ChunkPlanner::new(chunk_days).map_err(to_py_err)?;
    let windows = plan_range(&planner, parse_date(start)?, parse_date(end)?).map_err(to_py_err)?;
    Ok(windows
        .into_iter()
        .map(|w| (w.start.to_string(), w.end.to_string()))
        .collect())
}

/// Order-book imbalance for a pair of volumes.
#[pyfunction]
fn imbalance(bid_volume: f64, ask_volume: f64) -> Option<f64> {
    imbalance_features::imbalance(bid_volume, ask_volume)
}

// ============================================================================
// Module Definition
// ============================================================================

/// Order Imbalance Core - daily order-flow aggregation for Python.
#[pymodule]
fn order_imbalance_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<DailyRow>()?;
    m.add_class::<DailySummary>()?;

    // Engine classes
    m.add_class::<PyDailyAggregator>()?;

    // Functions
    m.add_function(wrap_pyfunction!(plan_windows, m)?)?;
    m.add_function(wrap_pyfunction!(imbalance, m)?)?;

    Ok(())
}
