//! Daily imbalance and price change metrics.
//!
//! Derives the imbalance and day-over-day price change columns of the daily
//! table and the correlation between them.

use imbalance_core::{Correlation, DailyRow, DailySummary};
use statrs::statistics::Statistics;

/// Minimum number of (imbalance, price change) pairs for a correlation.
pub const MIN_CORRELATION_PAIRS: usize = 2;

/// Order-book imbalance: (bid - ask) / (bid + ask).
///
/// `None` when both volumes are zero.
#[inline]
pub fn imbalance(bid_volume: f64, ask_volume: f64) -> Option<f64> {
    let total = bid_volume + ask_volume;
    if total == 0.0 {
        None
    } else {
        Some((bid_volume - ask_volume) / total)
    }
}

/// Relative price change from `previous` to `current`.
///
/// `None` when either price is absent or the previous price is zero.
#[inline]
pub fn price_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
        _ => None,
    }
}

/// Post-processor for the aggregator's daily rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFinalizer;

impl MetricsFinalizer {
    /// Create a new finalizer.
    pub fn new() -> Self {
        Self
    }

    /// Fill the imbalance and price change columns of rows that are in
    /// ascending date order.
    pub fn apply(&self, rows: &mut [DailyRow]) {
        let mut previous_price = None;
        for (i, row) in rows.iter_mut().enumerate() {
            row.imbalance = imbalance(row.bid_volume, row.ask_volume);
            row.price_change = if i == 0 {
                None
            } else {
                price_change(previous_price, row.price)
            };
            previous_price = row.price;
        }
    }

    /// Pearson correlation between imbalance and price change over the rows
    /// where both are defined.
    pub fn correlation(&self, rows: &[DailyRow]) -> Correlation {
        let (imbalances, changes): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|row| Some((row.imbalance?, row.price_change?)))
            .unzip();

        let pairs = imbalances.len();
        if pairs < MIN_CORRELATION_PAIRS {
            return Correlation::InsufficientData { pairs };
        }

        let sd_x = imbalances.iter().std_dev();
        let sd_y = changes.iter().std_dev();
        if !(sd_x > 0.0 && sd_y > 0.0) {
            return Correlation::Undefined;
        }

        let cov = imbalances.iter().covariance(changes.iter());
        let r = cov / (sd_x * sd_y);
        if r.is_finite() {
            Correlation::Value(r.clamp(-1.0, 1.0))
        } else {
            Correlation::Undefined
        }
    }

    /// Fill derived columns and compute the correlation.
    pub fn finalize(&self, mut rows: Vec<DailyRow>) -> DailySummary {
        self.apply(&mut rows);
        let correlation = self.correlation(&rows);
        DailySummary { rows, correlation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn row(day: u32, bid: f64, ask: f64, price: Option<f64>) -> DailyRow {
        DailyRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            bid_volume: bid,
            ask_volume: ask,
            price,
            imbalance: None,
            price_change: None,
        }
    }

    #[test]
    fn test_imbalance() {
        assert_relative_eq!(imbalance(10.0, 4.0).unwrap(), 6.0 / 14.0);
        assert_relative_eq!(imbalance(7.0, 0.0).unwrap(), 1.0);
        assert_relative_eq!(imbalance(0.0, 3.0).unwrap(), -1.0);
        assert_eq!(imbalance(0.0, 0.0), None);
    }

    #[test]
    fn test_price_change() {
        assert_relative_eq!(price_change(Some(100.0), Some(105.0)).unwrap(), 0.05, epsilon = 1e-12);
        assert_eq!(price_change(None, Some(105.0)), None);
        assert_eq!(price_change(Some(0.0), Some(105.0)), None);
        assert_eq!(price_change(Some(100.0), None), None);
    }

    #[test]
    fn test_apply() {
        let mut rows = vec![
            row(1, 10.0, 4.0, Some(100.0)),
            row(2, 0.0, 0.0, Some(105.0)),
            row(3, 1.0, 1.0, None),
            row(4, 2.0, 0.0, Some(110.0)),
        ];
        MetricsFinalizer::new().apply(&mut rows);

        assert_relative_eq!(rows[0].imbalance.unwrap(), 6.0 / 14.0);
        assert_eq!(rows[0].price_change, None);
        assert_eq!(rows[1].imbalance, None);
        assert_relative_eq!(rows[1].price_change.unwrap(), 0.05, epsilon = 1e-12);
        assert_relative_eq!(rows[2].imbalance.unwrap(), 0.0);
        assert_eq!(rows[2].price_change, None);
        // Previous row has no price.
        assert_eq!(rows[3].price_change, None);
    }

    #[test]
    fn test_first_row_has_no_price_change() {
        let mut rows = vec![row(5, 1.0, 2.0, Some(50.0))];
        MetricsFinalizer::new().apply(&mut rows);
        assert_eq!(rows[0].price_change, None);
    }

    #[test]
    fn test_correlation_perfect() {
        let mut rows = vec![
            row(1, 1.0, 1.0, Some(100.0)),
            row(2, 3.0, 1.0, Some(101.0)),
            row(3, 1.0, 3.0, Some(99.99)),
            row(4, 4.0, 0.0, Some(101.9898)),
        ];
        let finalizer = MetricsFinalizer::new();
        finalizer.apply(&mut rows);

        // Imbalance 0.5, -0.5, 1.0 against changes 0.01, -0.01, 0.02.
        let r = finalizer.correlation(&rows).value().unwrap();
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_correlation_insufficient() {
        let finalizer = MetricsFinalizer::new();
        let summary =
            finalizer.finalize(vec![row(1, 1.0, 0.0, Some(10.0)), row(2, 1.0, 0.0, Some(11.0))]);
        assert_eq!(summary.correlation, Correlation::InsufficientData { pairs: 1 });

        let empty = finalizer.finalize(Vec::new());
        assert_eq!(empty.correlation, Correlation::InsufficientData { pairs: 0 });
    }

    #[test]
    fn test_correlation_zero_variance() {
        let finalizer = MetricsFinalizer::new();
        let summary = finalizer.finalize(vec![
            row(1, 1.0, 0.0, Some(10.0)),
            row(2, 1.0, 0.0, Some(11.0)),
            row(3, 1.0, 0.0, Some(12.0)),
        ]);
        assert_eq!(summary.correlation, Correlation::Undefined);
    }

    #[test]
    fn test_correlation_matches_manual_pearson() {
        let xs = [0.2, -0.4, 0.9, 0.1, -0.3];
        let ys = [0.01, -0.02, 0.015, 0.003, 0.004];
        let rows: Vec<DailyRow> = xs
            .iter()
            .zip(ys.iter())
            .enumerate()
            .map(|(i, (x, y))| DailyRow {
                imbalance: Some(*x),
                price_change: Some(*y),
                ..row(i as u32 + 1, 0.0, 0.0, None)
            })
            .collect();

        let n = xs.len() as f64;
        let mx = xs.iter().sum::<f64>() / n;
        let my = ys.iter().sum::<f64>() / n;
        let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mx) * (y - my)).sum();
        let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
        let syy: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
        let expected = sxy / (sxx.sqrt() * syy.sqrt());

        let r = MetricsFinalizer::new().correlation(&rows).value().unwrap();
        assert_relative_eq!(r, expected, epsilon = 1e-9);
    }
}
