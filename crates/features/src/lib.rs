//! Daily feature computation for the order-imbalance system.
//!
//! This crate handles:
//! - Per-day aggregation of order events into side volumes and last price
//! - Imbalance and day-over-day price change columns
//! - Imbalance / price change correlation

pub mod aggregator;
pub mod metrics;

pub use aggregator::DailyAggregator;
pub use metrics::{imbalance, price_change, MetricsFinalizer};
