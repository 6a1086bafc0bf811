//! Rendering of daily summaries for the terminal and for JSON.

use imbalance_core::{DailyRow, DailySummary};
use imbalance_ingestion::NormalizationStats;
use imbalance_retrieval::RunReport;
use serde::Serialize;
use std::fmt::Write;

/// Everything a run prints with `--json`.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    pub summary: &'a DailySummary,
    /// Text form of the correlation, as shown in the table footer.
    pub correlation_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<&'a NormalizationStats>,
}

impl<'a> JsonOutput<'a> {
    pub fn new(summary: &'a DailySummary) -> Self {
        Self {
            summary,
            correlation_text: summary.correlation.to_string(),
            report: None,
            normalization: None,
        }
    }
}

fn opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

fn render_row(out: &mut String, row: &DailyRow) {
    let _ = writeln!(
        out,
        "{:<10}  {:>14.2}  {:>14.2}  {:>12}  {:>9}  {:>12}",
        row.date,
        row.bid_volume,
        row.ask_volume,
        opt(row.price, 4),
        opt(row.imbalance, 4),
        opt(row.price_change, 6),
    );
}

/// Fixed-width table of the daily rows followed by the correlation.
pub fn render_table(summary: &DailySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10}  {:>14}  {:>14}  {:>12}  {:>9}  {:>12}",
        "date", "bid_volume", "ask_volume", "price", "imbalance", "price_change"
    );
    for row in &summary.rows {
        render_row(&mut out, row);
    }
    if summary.rows.is_empty() {
        let _ = writeln!(out, "(no data)");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "correlation(imbalance, price_change): {}", summary.correlation);
    out
}
