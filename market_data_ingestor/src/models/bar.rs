//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the output of [`HistoryProvider::fetch_bars`](crate::providers::HistoryProvider::fetch_bars)
//! and the unit persisted by the cache, regardless of the bar granularity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// Vendor-agnostic. `adj_close` mirrors `close` since no corporate-action
/// adjustment is computed, and `open_interest` is 0 for equities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// The timestamp for this bar (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Adjusted closing price.
    pub adj_close: f64,

    /// Shares traded during the bar interval.
    pub volume: u64,

    /// Open contracts at the end of the interval.
    pub open_interest: u64,
}

/// Stable sort by timestamp, oldest first.
pub fn sort_bars(bars: &mut [Bar]) {
    bars.sort_by_key(|b| b.timestamp);
}
