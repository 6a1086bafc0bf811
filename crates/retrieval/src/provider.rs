//! Provider seams.
//!
//! A provider turns a window query into a lazy stream of raw events; a
//! resolver maps a human symbol to the provider's instrument id. Both are
//! traits so the driver can run against the historical API, a file, or an
//! in-memory fixture.

use chrono::{DateTime, FixedOffset, NaiveDate};
use imbalance_core::{Calendar, DateWindow, Error, RawEvent, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Symbology type used once a symbol has been resolved.
pub const INSTRUMENT_ID_STYPE: &str = "instrument_id";

/// One window request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery<'a> {
    /// Dataset identifier.
    pub dataset: &'a str,
    /// Symbol or instrument id to request.
    pub symbol: &'a str,
    /// Symbology type of `symbol`.
    pub stype_in: &'a str,
    /// Record schema.
    pub schema: &'a str,
    /// Dates covered.
    pub window: DateWindow,
    /// Instant the window starts (inclusive).
    pub start: DateTime<FixedOffset>,
    /// Instant after the window ends (exclusive).
    pub end: DateTime<FixedOffset>,
}

impl<'a> EventQuery<'a> {
    /// Build a query for `window`, with its instants taken from `calendar`.
    pub fn new(
        dataset: &'a str,
        symbol: &'a str,
        stype_in: &'a str,
        schema: &'a str,
        window: DateWindow,
        calendar: &Calendar,
    ) -> Result<Self> {
        let start = calendar.day_start(window.start);
        let end = window.end_exclusive().and_then(|d| calendar.day_start(d));
        match (start, end) {
            (Some(start), Some(end)) => Ok(Self {
                dataset,
                symbol,
                stype_in,
                schema,
                window,
                start,
                end,
            }),
            _ => Err(Error::data(format!("window {window} has no representable bounds"))),
        }
    }
}

/// Source of raw events for a window.
///
/// The returned iterator may be lazy; an `Err` item means the rest of the
/// window's stream is unusable.
pub trait EventProvider {
    type Events: Iterator<Item = Result<RawEvent>>;

    fn fetch(&self, query: &EventQuery<'_>) -> Result<Self::Events>;
}

impl<P: EventProvider + ?Sized> EventProvider for &P {
    type Events = P::Events;

    fn fetch(&self, query: &EventQuery<'_>) -> Result<Self::Events> {
        (**self).fetch(query)
    }
}

/// Maps a symbol to a provider instrument id.
pub trait SymbolResolver {
    /// `Ok(None)` when the provider has no mapping for `symbol` on `date`.
    fn resolve(
        &self,
        dataset: &str,
        symbol: &str,
        stype_in: &str,
        date: NaiveDate,
    ) -> Result<Option<String>>;
}

/// Resolver with a fixed symbol table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    ids: BTreeMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `symbol` to `id`.
    pub fn with(mut self, symbol: impl Into<String>, id: impl Into<String>) -> Self {
        self.ids.insert(symbol.into(), id.into());
        self
    }
}

impl SymbolResolver for StaticResolver {
    fn resolve(&self, _: &str, symbol: &str, _: &str, _: NaiveDate) -> Result<Option<String>> {
        Ok(self.ids.get(symbol).cloned())
    }
}

/// A request seen by an `InMemoryProvider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub symbol: String,
    pub stype_in: String,
    pub window: DateWindow,
}

/// Provider serving events held in memory, keyed by the date they belong to.
///
/// Windows can be made to fail, either up front or after part of their
/// stream has been delivered.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    events: BTreeMap<NaiveDate, Vec<RawEvent>>,
    failing: BTreeSet<NaiveDate>,
    failing_midstream: BTreeMap<NaiveDate, usize>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `event` in any window containing `date`.
    pub fn push(&mut self, date: NaiveDate, event: RawEvent) {
        self.events.entry(date).or_default().push(event);
    }

    /// Builder form of `push`.
    pub fn with_event(mut self, date: NaiveDate, event: RawEvent) -> Self {
        self.push(date, event);
        self
    }

    /// Fail any window containing `date` before it yields anything.
    pub fn fail_on(mut self, date: NaiveDate) -> Self {
        self.failing.insert(date);
        self
    }

    /// Fail any window containing `date` after `after` events were yielded.
    pub fn fail_midstream(mut self, date: NaiveDate, after: usize) -> Self {
        self.failing_midstream.insert(date, after);
        self
    }

    /// Requests served so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, query: &EventQuery<'_>) {
        let request = RecordedRequest {
            symbol: query.symbol.to_string(),
            stype_in: query.stype_in.to_string(),
            window: query.window,
        };
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }
}

impl EventProvider for InMemoryProvider {
    type Events = std::vec::IntoIter<Result<RawEvent>>;

    fn fetch(&self, query: &EventQuery<'_>) -> Result<Self::Events> {
        self.record(query);
        let window = query.window;

        if self.failing.range(window.start..=window.end).next().is_some() {
            return Err(Error::provider(format!("window {window} unavailable")));
        }

        let mut items: Vec<Result<RawEvent>> = self
            .events
            .range(window.start..=window.end)
            .flat_map(|(_, events)| events.iter().cloned().map(Ok))
            .collect();

        if let Some((_, after)) = self.failing_midstream.range(window.start..=window.end).next() {
            items.truncate(*after);
            items.push(Err(Error::provider(format!("stream for {window} interrupted"))));
        }

        Ok(items.into_iter())
    }
}
