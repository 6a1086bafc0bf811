//! Chunked retrieval driver.
//!
//! Splits a date range into windows, fetches each window's events from the
//! provider, normalizes them and feeds the daily aggregator. A window is
//! either fed completely or not at all; a failed window is reported and the
//! run moves on to the next one. At most two windows of raw events are held
//! at once (the one being fed and, with prefetch, the next).

use chrono::NaiveDate;
use imbalance_core::{Calendar, Config, DateWindow, Error, RawEvent, Result};
use imbalance_features::{DailyAggregator, MetricsFinalizer};
use imbalance_ingestion::{ChunkPlanner, EventNormalizer, NormalizationStats};
use serde::Serialize;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

use crate::provider::{EventProvider, EventQuery, SymbolResolver, INSTRUMENT_ID_STYPE};

/// Windows covering `[start, end]`.
///
/// `start == end` is planned as the single window `[start, start]`; any
/// other range goes through the planner, which rejects `start > end`.
pub fn plan_range(
    planner: &ChunkPlanner,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DateWindow>> {
    if start == end {
        return Ok(vec![DateWindow::new(start, end)]);
    }
    planner.plan(start, end)
}

/// Progress after a window has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Windows handled so far, including this one.
    pub completed: usize,
    /// Windows planned.
    pub total: usize,
    /// The window just handled.
    pub window: DateWindow,
    /// Whether the window was fed.
    pub succeeded: bool,
}

impl Progress {
    /// Fraction of windows handled.
    pub fn fraction(&self) -> f64 {
        if self.total > 0 {
            self.completed as f64 / self.total as f64
        } else {
            1.0
        }
    }
}

/// A window whose events could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowFailure {
    pub window: DateWindow,
    pub error: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Symbol as requested.
    pub requested_symbol: String,
    /// Instrument id the symbol resolved to, if any.
    pub resolved_symbol: Option<String>,
    /// Windows planned.
    pub windows_total: usize,
    /// Windows fed into the aggregator.
    pub windows_succeeded: usize,
    /// Windows skipped because retrieval failed.
    pub failed_windows: Vec<WindowFailure>,
    /// Raw events received from successful windows.
    pub events_received: u64,
    /// Events fed into the aggregator.
    pub events_fed: u64,
    /// Normalization counters over all fed windows.
    pub normalization: NormalizationStats,
}

impl RunReport {
    /// Symbol the provider was queried with.
    pub fn symbol_used(&self) -> &str {
        self.resolved_symbol.as_deref().unwrap_or(&self.requested_symbol)
    }

    /// Whether every planned window was fed.
    pub fn is_complete(&self) -> bool {
        self.failed_windows.is_empty() && self.windows_succeeded == self.windows_total
    }

    /// Whether the failed windows cover `date`.
    pub fn is_date_missing(&self, date: NaiveDate) -> bool {
        self.failed_windows.iter().any(|f| f.window.contains(date))
    }
}

/// Aggregator state and report of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub aggregator: DailyAggregator,
    pub report: RunReport,
}

impl RunOutput {
    /// Daily table with derived columns and correlation.
    pub fn summary(&self) -> imbalance_core::DailySummary {
        MetricsFinalizer::new().finalize(self.aggregator.finalize())
    }
}

/// Retrieval driver over a provider.
pub struct RetrievalDriver<P> {
    provider: P,
    resolver: Option<Box<dyn SymbolResolver>>,
    planner: ChunkPlanner,
    calendar: Calendar,
    dataset: String,
    schema: String,
    stype_in: String,
    resolve_symbols: bool,
    prefetch: bool,
}

impl<P: EventProvider + Sync> RetrievalDriver<P> {
    /// Create a driver from a validated configuration.
    pub fn new(provider: P, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            resolver: None,
            planner: ChunkPlanner::new(config.retrieval.chunk_days)?,
            calendar: config.calendar.calendar()?,
            dataset: config.retrieval.dataset.clone(),
            schema: config.retrieval.schema.clone(),
            stype_in: config.retrieval.stype_in.clone(),
            resolve_symbols: config.retrieval.resolve_symbols,
            prefetch: config.retrieval.prefetch,
        })
    }

    /// Resolve symbols through `resolver` before fetching.
    pub fn with_resolver(mut self, resolver: impl SymbolResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Enable or disable prefetching of the next window.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// The provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Windows a run over `[start, end]` would fetch.
    pub fn plan(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DateWindow>> {
        plan_range(&self.planner, start, end)
    }

    /// Run over `[start, end]` into a fresh aggregator.
    pub fn run(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        on_progress: impl FnMut(&Progress),
    ) -> Result<RunOutput> {
        let mut aggregator = DailyAggregator::new();
        let report = self.run_into(symbol, start, end, &mut aggregator, on_progress)?;
        Ok(RunOutput { aggregator, report })
    }

    /// Run over `[start, end]`, feeding `aggregator`.
    ///
    /// Fails only when the range cannot be planned; window failures are
    /// recorded in the report.
    pub fn run_into(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        aggregator: &mut DailyAggregator,
        mut on_progress: impl FnMut(&Progress),
    ) -> Result<RunReport> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(Error::config("symbol must not be empty"));
        }
        let windows = self.plan(start, end)?;

        let resolved = self.resolve(symbol, start);
        let (symbol_used, stype_used) = match resolved.as_deref() {
            Some(id) => (id, INSTRUMENT_ID_STYPE),
            None => (symbol, self.stype_in.as_str()),
        };

        let mut run = WindowFeeder {
            normalizer: EventNormalizer::new(self.calendar),
            report: RunReport {
                requested_symbol: symbol.to_string(),
                resolved_symbol: resolved.clone(),
                windows_total: windows.len(),
                ..RunReport::default()
            },
            aggregator,
            on_progress: &mut on_progress,
        };

        info!(
            symbol = %symbol,
            symbol_used = %symbol_used,
            %start,
            %end,
            windows = windows.len(),
            chunk_days = self.planner.chunk_days(),
            prefetch = self.prefetch,
            "starting retrieval"
        );

        let fetcher = WindowFetcher {
            provider: &self.provider,
            calendar: self.calendar,
            dataset: &self.dataset,
            schema: &self.schema,
            symbol: symbol_used,
            stype_in: stype_used,
        };

        if self.prefetch && windows.len() > 1 {
            fetch_prefetched(&fetcher, &windows, &mut run);
        } else {
            for window in &windows {
                let batch = fetcher.fetch(*window);
                run.feed(*window, batch);
            }
        }

        let mut report = run.report;
        report.normalization = *run.normalizer.stats();
        info!(
            windows_succeeded = report.windows_succeeded,
            windows_failed = report.failed_windows.len(),
            events_fed = report.events_fed,
            "retrieval finished"
        );
        Ok(report)
    }

    /// Instrument id for `symbol`, or `None` to query by the symbol itself.
    fn resolve(&self, symbol: &str, date: NaiveDate) -> Option<String> {
        if !self.resolve_symbols {
            return None;
        }
        let resolver = self.resolver.as_ref()?;
        match resolver.resolve(&self.dataset, symbol, &self.stype_in, date) {
            Ok(Some(id)) => {
                info!(symbol = %symbol, instrument_id = %id, "resolved symbol");
                Some(id)
            }
            Ok(None) => {
                warn!(symbol = %symbol, %date, "symbol did not resolve; using it as given");
                None
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "symbol resolution failed; using it as given");
                None
            }
        }
    }
}

/// Everything needed to fetch one window, borrowed from the driver.
struct WindowFetcher<'a, P> {
    provider: &'a P,
    calendar: Calendar,
    dataset: &'a str,
    schema: &'a str,
    symbol: &'a str,
    stype_in: &'a str,
}

impl<P: EventProvider> WindowFetcher<'_, P> {
    /// Fetch a whole window. An error anywhere in the stream fails the
    /// window, so nothing partial reaches the aggregator.
    fn fetch(&self, window: DateWindow) -> Result<Vec<RawEvent>> {
        let query = EventQuery::new(
            self.dataset,
            self.symbol,
            self.stype_in,
            self.schema,
            window,
            &self.calendar,
        )?;
        debug!(%window, symbol = %self.symbol, "fetching window");
        self.provider.fetch(&query)?.collect()
    }
}

/// Fetch windows on a worker thread, one window ahead of the feeder.
///
/// The rendezvous channel blocks the worker after it has fetched the next
/// window until the feeder takes it, which bounds resident batches to two.
fn fetch_prefetched<P: EventProvider + Sync>(
    fetcher: &WindowFetcher<'_, P>,
    windows: &[DateWindow],
    run: &mut WindowFeeder<'_>,
) {
    thread::scope(|scope| {
        let (tx, rx) = mpsc::sync_channel::<Result<Vec<RawEvent>>>(0);
        scope.spawn(move || {
            for window in windows {
                if tx.send(fetcher.fetch(*window)).is_err() {
                    break;
                }
            }
        });

        for window in windows {
            let batch = rx
                .recv()
                .unwrap_or_else(|_| Err(Error::provider("prefetch worker stopped")));
            run.feed(*window, batch);
        }
    });
}

/// Feeds fetched windows into the aggregator and tracks the report.
struct WindowFeeder<'a> {
    normalizer: EventNormalizer,
    report: RunReport,
    aggregator: &'a mut DailyAggregator,
    on_progress: &'a mut dyn FnMut(&Progress),
}

impl WindowFeeder<'_> {
    fn feed(&mut self, window: DateWindow, batch: Result<Vec<RawEvent>>) {
        let succeeded = match batch {
            Ok(events) => {
                let mut fed = 0u64;
                for raw in &events {
                    if let Some(event) = self.normalizer.normalize(raw) {
                        self.aggregator.apply(&event);
                        fed += 1;
                    }
                }
                self.report.events_received += events.len() as u64;
                self.report.events_fed += fed;
                self.report.windows_succeeded += 1;
                info!(%window, received = events.len(), fed, "window aggregated");
                true
            }
            Err(e) => {
                warn!(%window, error = %e, "window retrieval failed; skipping");
                self.report.failed_windows.push(WindowFailure {
                    window,
                    error: e.to_string(),
                });
                false
            }
        };

        let progress = Progress {
            completed: self.report.windows_succeeded + self.report.failed_windows.len(),
            total: self.report.windows_total,
            window,
            succeeded,
        };
        (self.on_progress)(&progress);
    }
}
