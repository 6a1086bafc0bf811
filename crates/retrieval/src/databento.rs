//! Databento historical API client.
//!
//! Windows are requested from `timeseries.get_range` as JSON lines and
//! parsed lazily as the response body streams in. Symbols are mapped to
//! instrument ids through `symbology.resolve`.

use chrono::{Days, NaiveDate, SecondsFormat};
use imbalance_core::config::ProviderConfig;
use imbalance_core::{Error, RawEvent, RawTimestamp, Result};
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::debug;

use crate::provider::{EventProvider, EventQuery, SymbolResolver, INSTRUMENT_ID_STYPE};

const RANGE_PATH: &str = "/v0/timeseries.get_range";
const RESOLVE_PATH: &str = "/v0/symbology.resolve";
/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 300;

/// Blocking client for the historical API.
#[derive(Clone)]
pub struct DatabentoClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for DatabentoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabentoClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DatabentoClient {
    /// Create a client authenticating with `api_key`.
    pub fn new(api_key: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("provider API key must not be empty"));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into an error carrying its body.
fn check_status(response: Response, context: &str) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(format!("{context}: HTTP {status}: {}", body.trim()))
}

impl EventProvider for DatabentoClient {
    type Events = JsonLinesEvents<BufReader<Response>>;

    fn fetch(&self, query: &EventQuery<'_>) -> Result<Self::Events> {
        let start = query.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = query.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let context = format!("{} {}", query.symbol, query.window);

        let response = self
            .http
            .get(self.url(RANGE_PATH))
            .basic_auth(&self.api_key, Some(""))
            .query(&[
                ("dataset", query.dataset),
                ("symbols", query.symbol),
                ("stype_in", query.stype_in),
                ("schema", query.schema),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("encoding", "json"),
                ("pretty_px", "true"),
                ("pretty_ts", "false"),
            ])
            .send()
            .map_err(|e| Error::provider(format!("{context}: request failed: {e}")))?;

        let response = check_status(response, &context).map_err(Error::provider)?;
        Ok(JsonLinesEvents::new(BufReader::new(response)))
    }
}

impl SymbolResolver for DatabentoClient {
    fn resolve(
        &self,
        dataset: &str,
        symbol: &str,
        stype_in: &str,
        date: NaiveDate,
    ) -> Result<Option<String>> {
        let end = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::resolution(format!("no day after {date}")))?;
        let start_date = date.to_string();
        let end_date = end.to_string();

        let response = self
            .http
            .post(self.url(RESOLVE_PATH))
            .basic_auth(&self.api_key, Some(""))
            .form(&[
                ("dataset", dataset),
                ("symbols", symbol),
                ("stype_in", stype_in),
                ("stype_out", INSTRUMENT_ID_STYPE),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
            ])
            .send()
            .map_err(|e| Error::resolution(format!("{symbol}: request failed: {e}")))?;

        let response = check_status(response, symbol).map_err(Error::resolution)?;
        let body: Value = response
            .json()
            .map_err(|e| Error::resolution(format!("{symbol}: unreadable response: {e}")))?;
        Ok(instrument_id_from_resolution(&body, symbol))
    }
}

/// First instrument id mapped to `symbol` in a resolution response.
pub fn instrument_id_from_resolution(body: &Value, symbol: &str) -> Option<String> {
    let first = body.get("result")?.get(symbol)?.as_array()?.first()?;
    match first.get("s")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lazy parser of a JSON-lines record stream.
///
/// A line that is not a JSON object (including one that is not UTF-8)
/// becomes an empty record, which the normalizer drops and counts; a read
/// error ends the stream with an error.
pub struct JsonLinesEvents<R> {
    reader: R,
    line: Vec<u8>,
    failed: bool,
}

impl<R: BufRead> JsonLinesEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesEvents<R> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::provider(format!("response stream broke: {e}"))));
                }
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(Ok(match serde_json::from_slice::<Value>(&self.line) {
                Ok(value) => raw_event_from_json(&value),
                Err(e) => {
                    debug!(error = %e, "unparsable record line");
                    RawEvent::default()
                }
            }));
        }
    }
}

/// Map one JSON record onto a raw event.
///
/// `ts_event` is read from the record header (`hd`) or the top level, as
/// nanoseconds or text. Sizes and prices may be numbers or numeric strings.
pub fn raw_event_from_json(value: &Value) -> RawEvent {
    let ts_event = value
        .get("hd")
        .and_then(|hd| hd.get("ts_event"))
        .or_else(|| value.get("ts_event"))
        .and_then(json_timestamp);

    RawEvent {
        ts_event,
        side: value.get("side").and_then(json_text),
        action: value.get("action").and_then(json_text),
        size: value.get("size").and_then(json_number),
        price: value.get("price").and_then(json_number),
    }
}

fn json_timestamp(value: &Value) -> Option<RawTimestamp> {
    match value {
        Value::Number(n) => n.as_i64().map(RawTimestamp::Nanos),
        Value::String(s) => Some(RawTimestamp::Text(s.clone())),
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
