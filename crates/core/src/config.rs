//! Configuration structures for the order-imbalance system.

use crate::calendar::Calendar;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retrieval (chunking and provider query) configuration.
    pub retrieval: RetrievalConfig,
    /// Day-bucketing configuration.
    pub calendar: CalendarConfig,
    /// Historical provider connection configuration.
    pub provider: ProviderConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing sections and fields take
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_days == 0 {
            return Err(Error::config("retrieval.chunk_days must be at least 1"));
        }
        if self.retrieval.dataset.trim().is_empty() {
            return Err(Error::config("retrieval.dataset must not be empty"));
        }
        if self.retrieval.schema.trim().is_empty() {
            return Err(Error::config("retrieval.schema must not be empty"));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(Error::config("provider.request_timeout_secs must be at least 1"));
        }
        self.calendar.calendar()?;
        Ok(())
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Provider dataset identifier (e.g., "GLBX.MDP3").
    pub dataset: String,
    /// Provider record schema (e.g., "mbo").
    pub schema: String,
    /// Calendar days per retrieval window.
    pub chunk_days: u32,
    /// Fetch the next window while the current one is aggregated.
    pub prefetch: bool,
    /// Resolve the symbol to a provider instrument id before fetching.
    pub resolve_symbols: bool,
    /// Input symbology type for requests and resolution.
    pub stype_in: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dataset: "GLBX.MDP3".to_string(),
            schema: "mbo".to_string(),
            chunk_days: 7,
            prefetch: false,
            resolve_symbols: true,
            stype_in: "raw_symbol".to_string(),
        }
    }
}

/// Day-bucketing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Offset from UTC, in minutes, of the trading calendar (0 = UTC).
    pub utc_offset_minutes: i32,
}

impl CalendarConfig {
    /// Build the calendar for this offset.
    pub fn calendar(&self) -> Result<Calendar> {
        Calendar::from_offset_minutes(self.utc_offset_minutes)
    }
}

/// Historical provider connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the historical API.
    pub base_url: String,
    /// Timeout for a single window request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hist.databento.com".to_string(),
            request_timeout_secs: 120,
        }
    }
}
