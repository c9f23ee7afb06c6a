//! Per-series coverage: which calendar days are already fully cached.
//!
//! ## Model
//! - One [`CoverageTracker`] per (symbol, [`SeriesKind`]).
//! - Listed days live in a `RoaringBitmap` keyed by [`day_id`].
//! - Gaps are `window \ listed`, where the window is every day of the request
//!   (weekdays only when the series skips weekends).
//!
//! ## Coalescing
//! Sorted missing days are folded into runs. Two neighbours join the same run
//! when their distance is at most [`merge_threshold`]: 1 day normally, 3 days
//! for weekend-aware series so that Friday and the following Monday stay together.
//!
//! ## Persistence
//! [`CoverageMeta`] is the serialized form; `listed_dates` is written as a sorted
//! list of `YYYY-MM-DD` strings.

use chrono::NaiveDate;
use market_data_ingestor::models::date_range::{DateRange, DateRangeError};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{day_from_id, day_id, is_weekend, merge_threshold};
use crate::series::SeriesKind;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Date {date} cannot be tracked")]
    UntrackableDate { date: NaiveDate },
    #[error(transparent)]
    Range(#[from] DateRangeError),
}

/// Persisted coverage of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageMeta {
    /// Upper-cased ticker.
    pub symbol: String,
    /// Partition the dates belong to.
    pub series_kind: SeriesKind,
    /// Whether gap detection ignores Saturdays and Sundays.
    #[serde(default)]
    pub skip_weekends: bool,
    /// Days with a complete record on disk, ascending.
    #[serde(default)]
    pub listed_dates: Vec<NaiveDate>,
}

/// Result of [`CoverageTracker::missing_ranges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gaps {
    /// Every requested day is already listed.
    NothingToSync,
    /// Maximal runs of missing days, chronological and non-overlapping.
    Ranges(Vec<DateRange>),
}

/// Earliest and latest listed day; both `None` when nothing is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boundaries {
    /// Earliest listed day.
    pub first: Option<NaiveDate>,
    /// Latest listed day.
    pub last: Option<NaiveDate>,
}

/// In-memory coverage for one (symbol, series kind).
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    symbol: String,
    series_kind: SeriesKind,
    skip_weekends: bool,
    listed: RoaringBitmap,
}

impl CoverageTracker {
    /// Empty coverage.
    pub fn new(symbol: impl Into<String>, series_kind: SeriesKind, skip_weekends: bool) -> Self {
        Self {
            symbol: symbol.into(),
            series_kind,
            skip_weekends,
            listed: RoaringBitmap::new(),
        }
    }

    /// Rebuild from the persisted form, keeping its weekend flag.
    pub fn from_meta(meta: &CoverageMeta) -> Result<Self, CoverageError> {
        let mut tracker = Self::new(meta.symbol.clone(), meta.series_kind, meta.skip_weekends);
        tracker.mark_listed(meta.listed_dates.iter().copied())?;
        Ok(tracker)
    }

    /// Snapshot for persistence.
    pub fn to_meta(&self) -> CoverageMeta {
        CoverageMeta {
            symbol: self.symbol.clone(),
            series_kind: self.series_kind,
            skip_weekends: self.skip_weekends,
            listed_dates: self.listed_dates(),
        }
    }

    /// Symbol the coverage belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Partition the coverage belongs to.
    pub fn series_kind(&self) -> SeriesKind {
        self.series_kind
    }

    /// Whether weekends are left out of gap detection.
    pub fn skip_weekends(&self) -> bool {
        self.skip_weekends
    }

    /// Override the weekend flag, e.g. when configuration changed since the meta was written.
    pub fn set_skip_weekends(&mut self, skip_weekends: bool) {
        self.skip_weekends = skip_weekends;
    }

    /// Number of listed days.
    pub fn len(&self) -> u64 {
        self.listed.len()
    }

    /// No day listed yet.
    pub fn is_empty(&self) -> bool {
        self.listed.is_empty()
    }

    /// Whether `date` is listed.
    pub fn is_listed(&self, date: NaiveDate) -> bool {
        day_id(date).is_some_and(|id| self.listed.contains(id))
    }

    /// Listed days in ascending order.
    pub fn listed_dates(&self) -> Vec<NaiveDate> {
        self.listed.iter().filter_map(day_from_id).collect()
    }

    /// Add days to the listed set.
    pub fn mark_listed<I>(&mut self, dates: I) -> Result<(), CoverageError>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        for date in dates {
            let id = day_id(date).ok_or(CoverageError::UntrackableDate { date })?;
            self.listed.insert(id);
        }
        Ok(())
    }

    /// Replace the listed set wholesale, e.g. after rescanning storage.
    pub fn replace_listed<I>(&mut self, dates: I) -> Result<(), CoverageError>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut fresh = Self::new(String::new(), self.series_kind, self.skip_weekends);
        fresh.mark_listed(dates)?;
        self.listed = fresh.listed;
        Ok(())
    }

    /// Earliest and latest listed day.
    pub fn boundary_dates(&self) -> Boundaries {
        Boundaries {
            first: self.listed.min().and_then(day_from_id),
            last: self.listed.max().and_then(day_from_id),
        }
    }

    /// Days of `range` that are not listed, ascending.
    pub fn missing_dates(&self, range: &DateRange) -> Result<Vec<NaiveDate>, CoverageError> {
        let missing = self.missing_ids(range)?;
        Ok(missing.iter().filter_map(day_from_id).collect())
    }

    /// Missing days of `range` coalesced into maximal runs.
    pub fn missing_ranges(&self, range: &DateRange) -> Result<Gaps, CoverageError> {
        let missing = self.missing_ids(range)?;
        if missing.is_empty() {
            return Ok(Gaps::NothingToSync);
        }
        let runs = coalesce_runs(&missing, merge_threshold(self.skip_weekends));
        let mut ranges = Vec::with_capacity(runs.len());
        for (start, end) in runs {
            let (Some(first), Some(last)) = (day_from_id(start), day_from_id(end)) else {
                continue;
            };
            ranges.push(DateRange::days(first, last)?);
        }
        Ok(Gaps::Ranges(ranges))
    }

    fn missing_ids(&self, range: &DateRange) -> Result<RoaringBitmap, CoverageError> {
        let mut window = RoaringBitmap::new();
        for date in range.iter_days() {
            if self.skip_weekends && is_weekend(date) {
                continue;
            }
            let id = day_id(date).ok_or(CoverageError::UntrackableDate { date })?;
            window.insert(id);
        }
        Ok(window - &self.listed)
    }
}

/// Fold sorted ids into inclusive `(start, end)` runs, joining neighbours at
/// most `threshold` apart.
fn coalesce_runs(rb: &RoaringBitmap, threshold: u32) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    let mut it = rb.iter();
    if let Some(mut run_start) = it.next() {
        let mut prev = run_start;
        for x in it {
            if x - prev <= threshold {
                prev = x;
                continue;
            }
            out.push((run_start, prev));
            run_start = x;
            prev = x;
        }
        out.push((run_start, prev));
    }
    out
}
