#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use asset_sync::store::JsonStore;
use asset_sync::sync::{Clock, SyncOptions, SyncOrchestrator};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use market_data_ingestor::models::{
    bar::Bar,
    date_range::DateRange,
    granularity::Granularity,
    tick::{Tick, Trade},
};
use market_data_ingestor::providers::{
    EmptyResultSnafu, HistoryProvider, ProviderError, SourceUnreachableSnafu,
};
use tempfile::TempDir;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Noon UTC, which is the same calendar day in New York.
pub fn noon(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What the fake answers for a given 1-based call number.
pub enum Script {
    Data,
    Empty,
    Unreachable,
}

/// Counts calls and records the ranges it was asked for.
pub struct FakeProvider {
    calls: AtomicUsize,
    ranges: Mutex<Vec<DateRange>>,
    delay: Duration,
    script: Box<dyn Fn(usize, &DateRange) -> Script + Send + Sync>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::scripted(|_, _| Script::Data)
    }

    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(usize, &DateRange) -> Script + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            script: Box::new(script),
        }
    }

    /// Fails fatally on call `n`, answers with data otherwise.
    pub fn failing_on(n: usize) -> Self {
        Self::scripted(move |call, _| {
            if call == n {
                Script::Unreachable
            } else {
                Script::Data
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<DateRange> {
        self.ranges.lock().unwrap().clone()
    }

    async fn answer(&self, range: &DateRange) -> Result<(), ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.ranges.lock().unwrap().push(*range);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match (self.script)(call, range) {
            Script::Data => Ok(()),
            Script::Empty => Err(EmptyResultSnafu {
                url: format!("fake://{call}"),
            }
            .build()),
            Script::Unreachable => Err(SourceUnreachableSnafu {
                message: "fake source down",
            }
            .build()),
        }
    }
}

#[async_trait]
impl HistoryProvider for FakeProvider {
    async fn fetch_bars(
        &self,
        _symbol: &str,
        _granularity: Granularity,
        range: DateRange,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.answer(&range).await?;
        Ok(range.iter_days().map(|day| bar(day, 100.0)).collect())
    }

    async fn fetch_ticks(
        &self,
        _symbol: &str,
        range: DateRange,
        _trades: bool,
        _quotes: bool,
    ) -> Result<Vec<Tick>, ProviderError> {
        self.answer(&range).await?;
        Ok(vec![trade_at(range.from()), trade_at(range.from())])
    }
}

pub fn bar(day: NaiveDate, close: f64) -> Bar {
    Bar {
        timestamp: Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap()),
        open: close,
        high: close,
        low: close,
        close,
        adj_close: close,
        volume: 1_000,
        open_interest: 0,
    }
}

pub fn trade_at(ts: chrono::NaiveDateTime) -> Tick {
    Tick::Trade(Trade {
        timestamp: Utc.from_utc_datetime(&ts),
        price: 10.0,
        size: 100,
        exchange: "Q".to_string(),
        conditions: Default::default(),
    })
}

pub struct Harness {
    _dir: TempDir, // keep alive for the life of the test
    pub store: JsonStore,
    pub provider: Arc<FakeProvider>,
    pub orchestrator: SyncOrchestrator,
}

/// Orchestrator over a fresh temp cache, with "now" pinned to `today` at noon UTC.
pub fn harness(provider: FakeProvider, options: SyncOptions, today: NaiveDate) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let store = JsonStore::new(dir.path());
    let provider = Arc::new(provider);
    let orchestrator = SyncOrchestrator::new(provider.clone(), store.clone(), options)
        .with_clock(Arc::new(FixedClock(noon(today))));
    Harness {
        _dir: dir,
        store,
        provider,
        orchestrator,
    }
}

pub fn options(workers: usize, skip_weekends: bool) -> SyncOptions {
    SyncOptions {
        workers,
        queue_capacity: 2,
        skip_weekends,
        time_zone: chrono_tz::America::New_York,
    }
}
