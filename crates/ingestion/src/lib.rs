//! Data ingestion and normalization for the order-imbalance system.
//!
//! This crate handles:
//! - Retrieval window planning (bounded date chunks)
//! - Raw record normalization (date bucketing, side/action parsing)
//! - CSV record input and daily table export

pub mod csv_source;
pub mod normalizer;
pub mod planner;

pub use csv_source::{write_daily_csv, CsvColumns, CsvEventSource};
pub use normalizer::{parse_timestamp, EventNormalizer, NormalizationStats};
pub use planner::{plan, ChunkPlanner};
