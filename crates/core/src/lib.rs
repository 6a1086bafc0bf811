//! Core types and configuration for the order-imbalance system.
//!
//! This crate provides shared types used across all other crates:
//! - Order event types (raw and normalized) and daily summary rows
//! - Trading calendar (timestamp to date bucketing)
//! - Configuration structures
//! - Common error types

pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use calendar::Calendar;
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
