//! Error types for the order-imbalance system.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the order-imbalance system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Date range that cannot be planned.
    #[error("Invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// Historical data provider error (request, status or body).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Symbol resolution error.
    #[error("Symbol resolution error: {0}")]
    Resolution(String),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    /// Create a symbol resolution error.
    pub fn resolution(msg: impl Into<String>) -> Self {
        Error::Resolution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message() {
        let err = Error::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: start 2024-01-05 must be before end 2024-01-01"
        );
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(Error::provider("503"), Error::Provider(m) if m == "503"));
        assert!(matches!(Error::config("bad"), Error::Config(_)));
    }
}
