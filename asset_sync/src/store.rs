//! JSON file cache for bars, ticks and coverage metadata.
//!
//! Layout under the root:
//! ```text
//! candles/<granularity>/<SYMBOL>.json           bars, ascending
//! candles/<granularity>/.meta/<SYMBOL>.json     CoverageMeta
//! ticks/<feed>/<SYMBOL>/<day>.json              one day of ticks, possibly []
//! ticks/<feed>/.meta/<SYMBOL>.json              CoverageMeta
//! ```
//! Every write lands in a sibling `.tmp` file first and is then renamed over
//! the target, so a reader never sees a half-written file.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use market_data_ingestor::models::{bar::Bar, granularity::Granularity, tick::Tick};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

use crate::coverage::CoverageMeta;
use crate::series::{SeriesKind, TickFeed};

/// Default layout of per-day tick file names.
pub const DEFAULT_FILE_DATE_FORMAT: &str = "%Y-%m-%d";

const META_DIR: &str = ".meta";

/// Cache access failures. Every variant names the path involved.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Readback of a symbol that was never cached.
    #[error("No stored data for {symbol} at {}", .path.display())]
    SymbolDataNotFound { symbol: String, path: PathBuf },
}

/// Cache rooted at a directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
    file_date_format: String,
}

impl JsonStore {
    /// Store rooted at `root`, with `YYYY-MM-DD` day files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_date_format: DEFAULT_FILE_DATE_FORMAT.to_string(),
        }
    }

    /// chrono layout for tick day file stems.
    pub fn with_file_date_format(mut self, layout: impl Into<String>) -> Self {
        self.file_date_format = layout.into();
        self
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Layout of day file stems.
    pub fn file_date_format(&self) -> &str {
        &self.file_date_format
    }

    fn series_dir(&self, kind: SeriesKind) -> PathBuf {
        let top = match kind {
            SeriesKind::Bars(_) => "candles",
            SeriesKind::Ticks(_) => "ticks",
        };
        self.root.join(top).join(kind.folder_name())
    }

    /// File holding every bar of the symbol at this granularity.
    pub fn bars_path(&self, symbol: &str, granularity: Granularity) -> PathBuf {
        self.series_dir(SeriesKind::Bars(granularity))
            .join(format!("{symbol}.json"))
    }

    /// Directory holding one file per cached day.
    pub fn ticks_dir(&self, symbol: &str, feed: TickFeed) -> PathBuf {
        self.series_dir(SeriesKind::Ticks(feed)).join(symbol)
    }

    /// File holding one day of ticks.
    pub fn tick_day_path(&self, symbol: &str, feed: TickFeed, day: NaiveDate) -> PathBuf {
        self.ticks_dir(symbol, feed)
            .join(format!("{}.json", day.format(&self.file_date_format)))
    }

    /// Coverage metadata file of the series.
    pub fn meta_path(&self, symbol: &str, kind: SeriesKind) -> PathBuf {
        self.series_dir(kind)
            .join(META_DIR)
            .join(format!("{symbol}.json"))
    }

    /// `None` when the series was never synced.
    pub async fn load_meta(
        &self,
        symbol: &str,
        kind: SeriesKind,
    ) -> Result<Option<CoverageMeta>, StoreError> {
        read_json(&self.meta_path(symbol, kind)).await
    }

    /// Atomically replace the series' coverage metadata.
    pub async fn save_meta(&self, meta: &CoverageMeta) -> Result<(), StoreError> {
        let path = self.meta_path(&meta.symbol, meta.series_kind);
        write_json(&path, meta).await
    }

    /// `None` when no bars were ever stored for this symbol and granularity.
    pub async fn read_bars(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Option<Vec<Bar>>, StoreError> {
        read_json(&self.bars_path(symbol, granularity)).await
    }

    /// Replace the whole bar file.
    pub async fn save_bars(
        &self,
        symbol: &str,
        granularity: Granularity,
        bars: &[Bar],
    ) -> Result<(), StoreError> {
        write_json(&self.bars_path(symbol, granularity), &bars).await
    }

    /// `None` when the day has no file.
    pub async fn read_ticks_day(
        &self,
        symbol: &str,
        feed: TickFeed,
        day: NaiveDate,
    ) -> Result<Option<Vec<Tick>>, StoreError> {
        read_json(&self.tick_day_path(symbol, feed, day)).await
    }

    /// Write one day of ticks; an empty slice is stored as `[]`.
    pub async fn save_ticks(
        &self,
        symbol: &str,
        feed: TickFeed,
        day: NaiveDate,
        ticks: &[Tick],
    ) -> Result<(), StoreError> {
        write_json(&self.tick_day_path(symbol, feed, day), &ticks).await
    }

    /// Days with a tick file on disk, ascending.
    ///
    /// Only regular `*.json` files whose stem parses with the configured layout
    /// count; leftovers such as `.tmp` files are ignored. A missing directory
    /// yields an empty list.
    pub async fn stored_tick_days(
        &self,
        symbol: &str,
        feed: TickFeed,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let dir = self.ticks_dir(symbol, feed);
        let io_err = |source: io::Error| StoreError::Io {
            path: dir.clone(),
            source,
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut days = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if !entry.file_type().await.map_err(io_err)?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match NaiveDate::parse_from_str(stem, &self.file_date_format) {
                Ok(day) => days.push(day),
                Err(_) => debug!(path = %path.display(), "ignoring file with unparseable day"),
            }
        }
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }

    /// Whether a tick directory exists for this symbol and feed.
    pub async fn has_ticks_dir(&self, symbol: &str, feed: TickFeed) -> Result<bool, StoreError> {
        let dir = self.ticks_dir(symbol, feed);
        tokio::fs::try_exists(&dir)
            .await
            .map_err(|source| StoreError::Io { path: dir, source })
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let body = serde_json::to_vec(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &body).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

// -------------------- tests --------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageTracker;
    use chrono::{TimeZone, Utc};
    use market_data_ingestor::models::tick::Trade;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn trade(secs: u32) -> Tick {
        Tick::Trade(Trade {
            timestamp: Utc.with_ymd_and_hms(2018, 11, 1, 9, 30, secs).unwrap(),
            price: 10.5,
            size: 100,
            exchange: "Q".to_string(),
            conditions: Default::default(),
        })
    }

    #[test]
    fn layout() {
        let store = JsonStore::new("/cache");
        assert_eq!(
            store.bars_path("AAPL", Granularity::Intraday(5)),
            PathBuf::from("/cache/candles/5min/AAPL.json")
        );
        assert_eq!(
            store.tick_day_path("AAPL", TickFeed::QuotesTrades, d(2018, 11, 1)),
            PathBuf::from("/cache/ticks/quotes_trades/AAPL/2018-11-01.json")
        );
        assert_eq!(
            store.meta_path("AAPL", SeriesKind::Bars(Granularity::Daily)),
            PathBuf::from("/cache/candles/day/.meta/AAPL.json")
        );
    }

    #[tokio::test]
    async fn missing_files_read_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.read_bars("AAPL", Granularity::Daily).await.unwrap().is_none());
        assert!(
            store
                .load_meta("AAPL", SeriesKind::Ticks(TickFeed::Trades))
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.stored_tick_days("AAPL", TickFeed::Trades).await.unwrap().is_empty());
        assert!(!store.has_ticks_dir("AAPL", TickFeed::Trades).await.unwrap());
    }

    #[tokio::test]
    async fn ticks_roundtrip_and_no_tmp_left() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        let day = d(2018, 11, 1);
        store
            .save_ticks("AAPL", TickFeed::Trades, day, &[trade(0), trade(1)])
            .await
            .unwrap();
        let back = store.read_ticks_day("AAPL", TickFeed::Trades, day).await.unwrap();
        assert_eq!(back, Some(vec![trade(0), trade(1)]));

        let names: Vec<_> = std::fs::read_dir(store.ticks_dir("AAPL", TickFeed::Trades))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["2018-11-01.json".to_string()]);
    }

    #[tokio::test]
    async fn rescan_ignores_noise() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        store.save_ticks("AAPL", TickFeed::Trades, d(2018, 11, 2), &[]).await.unwrap();
        store.save_ticks("AAPL", TickFeed::Trades, d(2018, 11, 1), &[]).await.unwrap();

        let tick_dir = store.ticks_dir("AAPL", TickFeed::Trades);
        std::fs::write(tick_dir.join("2018-11-05.json.tmp"), b"[").unwrap();
        std::fs::write(tick_dir.join("notes.json"), b"[]").unwrap();
        std::fs::write(tick_dir.join("2018-11-06.csv"), b"").unwrap();
        std::fs::create_dir(tick_dir.join("2018-11-07.json")).unwrap();

        assert_eq!(
            store.stored_tick_days("AAPL", TickFeed::Trades).await.unwrap(),
            vec![d(2018, 11, 1), d(2018, 11, 2)]
        );
    }

    #[tokio::test]
    async fn custom_file_date_format() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path()).with_file_date_format("%Y%m%d");
        store.save_ticks("MSFT", TickFeed::Quotes, d(2018, 11, 1), &[]).await.unwrap();
        assert!(
            store
                .ticks_dir("MSFT", TickFeed::Quotes)
                .join("20181101.json")
                .is_file()
        );
        assert_eq!(
            store.stored_tick_days("MSFT", TickFeed::Quotes).await.unwrap(),
            vec![d(2018, 11, 1)]
        );
    }

    #[tokio::test]
    async fn meta_roundtrip_and_corrupt_meta_is_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        let kind = SeriesKind::Bars(Granularity::Daily);
        let mut tracker = CoverageTracker::new("AAPL", kind, true);
        tracker.mark_listed([d(2018, 11, 1)]).unwrap();
        store.save_meta(&tracker.to_meta()).await.unwrap();
        assert_eq!(
            store.load_meta("AAPL", kind).await.unwrap(),
            Some(tracker.to_meta())
        );

        std::fs::write(store.meta_path("AAPL", kind), b"{not json").unwrap();
        assert!(matches!(
            store.load_meta("AAPL", kind).await,
            Err(StoreError::Json { .. })
        ));
    }
}
