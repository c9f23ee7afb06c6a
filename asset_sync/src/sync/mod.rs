//! Incremental synchronization of the local cache against a [`HistoryProvider`].
//!
//! ## What this does
//! - Loads the series' [`CoverageTracker`] from the store and works out which days
//!   are missing for the request.
//! - Fetches only those days (ticks) or the uncovered prefix/suffix (bars).
//! - Persists the records, then rewrites the coverage metadata exactly once.
//!
//! ## Consistency
//! Coverage is never written mid-batch. A batch that fails leaves the metadata
//! as it was; files already written by finished jobs stay on disk and are picked
//! up by the next successful run's rescan.
//!
//! ## Time zones
//! Request instants are mapped to calendar days in the configured reference zone
//! (the vendor's exchange zone). Ticks are never cached for the current local day.

mod bars;
mod read;
mod ticks;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use market_data_ingestor::models::{granularity::Granularity, time_of_day::TimeOfDay};
use market_data_ingestor::providers::HistoryProvider;

use crate::coverage::CoverageTracker;
use crate::error::SyncError;
use crate::series::SeriesKind;
use crate::store::JsonStore;
use crate::tz::local_day;

/// Source of "now" for the yesterday clamp.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What an update did when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Everything requested was already cached; no request was made.
    NothingToSync,
    /// `days` calendar days were fetched and are now listed.
    Synced {
        /// Number of days fetched.
        days: usize,
    },
}

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Concurrent tick fetches.
    pub workers: usize,
    /// Bound of the tick job queue.
    pub queue_capacity: usize,
    /// Ignore Saturdays and Sundays in gap detection and readback.
    pub skip_weekends: bool,
    /// Zone whose calendar days partition the cache.
    pub time_zone: Tz,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 2,
            skip_weekends: true,
            time_zone: chrono_tz::America::New_York,
        }
    }
}

/// Bar update request.
#[derive(Debug, Clone)]
pub struct BarsUpdateParams {
    /// Ticker, case-insensitive.
    pub symbol: String,
    /// Bar size.
    pub granularity: Granularity,
    /// Only the local calendar day of each end matters.
    pub from: DateTime<Utc>,
    /// Last instant of the request, inclusive.
    pub to: DateTime<Utc>,
}

/// Tick update request.
#[derive(Debug, Clone)]
pub struct TickUpdateParams {
    /// Ticker, case-insensitive.
    pub symbol: String,
    /// Only the local calendar day of each end matters.
    pub from: DateTime<Utc>,
    /// Last instant of the request, inclusive.
    pub to: DateTime<Utc>,
    /// Part of each day to fetch. Mixing windows across runs for one symbol is not detected.
    pub start_time: TimeOfDay,
    /// End of the daily window, inclusive.
    pub end_time: TimeOfDay,
    /// Fetch trades.
    pub trades: bool,
    /// Fetch quotes.
    pub quotes: bool,
}

impl TickUpdateParams {
    /// Whole trading days, both feeds chosen by flag.
    pub fn full_days(
        symbol: impl Into<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        trades: bool,
        quotes: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            from,
            to,
            start_time: TimeOfDay::START_OF_DAY,
            end_time: TimeOfDay::END_OF_DAY,
            trades,
            quotes,
        }
    }
}

/// Drives bar and tick updates for one cache.
pub struct SyncOrchestrator {
    provider: Arc<dyn HistoryProvider>,
    store: JsonStore,
    options: SyncOptions,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    /// Orchestrator using the system clock.
    pub fn new(provider: Arc<dyn HistoryProvider>, store: JsonStore, options: SyncOptions) -> Self {
        Self {
            provider,
            store,
            options,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. to pin "today" in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying cache.
    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    /// Tuning in effect.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn local_days(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(NaiveDate, NaiveDate), SyncError> {
        let first = local_day(from, self.options.time_zone);
        let last = local_day(to, self.options.time_zone);
        if first > last {
            return Err(SyncError::InvalidRange {
                from: first,
                to: last,
            });
        }
        Ok((first, last))
    }

    async fn load_tracker(
        &self,
        symbol: &str,
        kind: SeriesKind,
    ) -> Result<CoverageTracker, SyncError> {
        let mut tracker = match self.store.load_meta(symbol, kind).await? {
            Some(meta) => CoverageTracker::from_meta(&meta)?,
            None => CoverageTracker::new(symbol, kind, self.options.skip_weekends),
        };
        tracker.set_skip_weekends(self.options.skip_weekends);
        Ok(tracker)
    }
}

/// Upper-cased symbol, rejecting values that cannot name a cache file.
fn normalize_symbol(symbol: &str) -> Result<String, SyncError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(SyncError::InvalidParams("symbol is empty".to_string()));
    }
    if symbol.contains(['/', '\\']) || symbol.starts_with('.') {
        return Err(SyncError::InvalidParams(format!(
            "symbol {symbol:?} is not a valid file name"
        )));
    }
    Ok(symbol.to_uppercase())
}
