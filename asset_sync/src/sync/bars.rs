//! Bar updates: one file per (symbol, granularity), extended at its edges.
//!
//! Coverage for bars is kept contiguous. A request inside `[first, last]` is
//! already served; otherwise only the uncovered prefix `[from, first - 1]` and
//! suffix `[last + 1, to]` are fetched, so the listed span grows without holes.
//! When weekends are skipped, a span's weekend edges are listed without being
//! asked for, and a weekend-only span is never sent to the vendor.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveTime};
use market_data_ingestor::models::{
    bar::{Bar, sort_bars},
    date_range::DateRange,
    granularity::Granularity,
    time_of_day::TimeOfDay,
};
use tracing::{debug, info};

use super::{BarsUpdateParams, SyncOrchestrator, SyncOutcome, normalize_symbol};
use crate::calendar::is_weekend;
use crate::coverage::Boundaries;
use crate::error::SyncError;
use crate::series::SeriesKind;
use crate::tz::yesterday;

impl SyncOrchestrator {
    /// Bring the stored bars up to cover `[from, to]`, `to` clamped to yesterday.
    ///
    /// Vendor errors, including an empty answer for a span with weekdays, abort
    /// the update; a listed day always has its bars in the file.
    pub async fn update_bars(&self, params: BarsUpdateParams) -> Result<SyncOutcome, SyncError> {
        let symbol = normalize_symbol(&params.symbol)?;
        let granularity = params.granularity.validate()?;
        let (first, requested_last) = self.local_days(params.from, params.to)?;
        let last = requested_last.min(yesterday(self.clock.now(), self.options.time_zone));
        if first > last {
            return Err(SyncError::InvalidRange {
                from: first,
                to: last,
            });
        }

        let kind = SeriesKind::Bars(granularity);
        let mut tracker = self.load_tracker(&symbol, kind).await?;
        let plan = plan_fetches(tracker.boundary_dates(), first, last);
        if plan.is_empty() {
            info!(%symbol, %granularity, %first, %last, "bars already cached");
            return Ok(SyncOutcome::NothingToSync);
        }

        info!(%symbol, %granularity, %first, %last, fetches = plan.len(), "bar sync started");
        let mut fetched = Vec::new();
        let mut requests = 0usize;
        for &(lo, hi) in &plan {
            let Some((lo, hi)) = trading_span(lo, hi, self.options.skip_weekends) else {
                debug!(%symbol, %lo, %hi, "weekend-only span, listed without fetch");
                continue;
            };
            let range = wire_range(granularity, lo, hi)?;
            let bars = self
                .provider
                .fetch_bars(&symbol, granularity, range)
                .await?;
            debug!(%symbol, %lo, %hi, bars = bars.len(), "bars fetched");
            requests += 1;
            fetched.extend(bars);
        }

        let mut stored_count = None;
        if requests > 0 {
            let stored = self
                .store
                .read_bars(&symbol, granularity)
                .await?
                .unwrap_or_default();
            let merged = merge_bars(stored, fetched);
            self.store.save_bars(&symbol, granularity, &merged).await?;
            stored_count = Some(merged.len());
        }

        let mut days = 0usize;
        for &(lo, hi) in &plan {
            let range = DateRange::days(lo, hi)
                .map_err(|_| SyncError::InvalidRange { from: lo, to: hi })?;
            days += range.day_count() as usize;
            tracker.mark_listed(range.iter_days())?;
        }
        self.store.save_meta(&tracker.to_meta()).await?;
        info!(%symbol, %granularity, days, requests, stored = ?stored_count, "bar sync finished");
        Ok(SyncOutcome::Synced { days })
    }
}

/// Inclusive day spans to fetch so that `[first, last]` becomes covered.
fn plan_fetches(
    bounds: Boundaries,
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<(NaiveDate, NaiveDate)> {
    let (Some(lo), Some(hi)) = (bounds.first, bounds.last) else {
        return vec![(first, last)];
    };
    let mut plan = Vec::with_capacity(2);
    if first < lo {
        if let Some(before) = lo.checked_sub_days(Days::new(1)) {
            plan.push((first, before));
        }
    }
    if last > hi {
        if let Some(after) = hi.checked_add_days(Days::new(1)) {
            plan.push((after, last));
        }
    }
    plan
}

/// `[lo, hi]` with weekend days trimmed off both ends when `skip_weekends` is
/// set. `None` when nothing but weekend is left.
fn trading_span(
    lo: NaiveDate,
    hi: NaiveDate,
    skip_weekends: bool,
) -> Option<(NaiveDate, NaiveDate)> {
    if !skip_weekends {
        return Some((lo, hi));
    }
    let (mut lo, mut hi) = (lo, hi);
    while lo <= hi && is_weekend(lo) {
        lo = lo.succ_opt()?;
    }
    while lo <= hi && is_weekend(hi) {
        hi = hi.pred_opt()?;
    }
    (lo <= hi).then_some((lo, hi))
}

/// Intraday requests cover the whole of the last day; daily and weekly ones
/// are addressed by midnight.
fn wire_range(
    granularity: Granularity,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<DateRange, SyncError> {
    let end = match granularity {
        Granularity::Intraday(_) => TimeOfDay::END_OF_DAY,
        Granularity::Daily | Granularity::Weekly => TimeOfDay::START_OF_DAY,
    };
    DateRange::new(
        first.and_time(NaiveTime::MIN),
        last.and_time(end.to_naive_time()),
    )
    .map_err(|_| SyncError::InvalidRange {
        from: first,
        to: last,
    })
}

/// Union by timestamp, fresh bars replacing stored ones, ascending.
fn merge_bars(stored: Vec<Bar>, fresh: Vec<Bar>) -> Vec<Bar> {
    let mut by_ts = BTreeMap::new();
    for bar in stored.into_iter().chain(fresh) {
        by_ts.insert(bar.timestamp, bar);
    }
    let mut merged: Vec<Bar> = by_ts.into_values().collect();
    sort_bars(&mut merged);
    merged
}
