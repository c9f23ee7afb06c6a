//! Readback of what the cache already holds.

use chrono::{DateTime, Utc};
use market_data_ingestor::models::{bar::Bar, date_range::DateRange, granularity::Granularity, tick::Tick};
use tracing::warn;

use super::{SyncOrchestrator, normalize_symbol};
use crate::calendar::is_weekend;
use crate::error::SyncError;
use crate::series::TickFeed;
use crate::store::StoreError;

impl SyncOrchestrator {
    /// All stored bars for the symbol and granularity, ascending.
    pub async fn stored_bars(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Vec<Bar>, SyncError> {
        let symbol = normalize_symbol(symbol)?;
        match self.store.read_bars(&symbol, granularity).await? {
            Some(bars) => Ok(bars),
            None => Err(StoreError::SymbolDataNotFound {
                path: self.store.bars_path(&symbol, granularity),
                symbol,
            }
            .into()),
        }
    }

    /// Stored ticks for each local day of `[from, to]`, in day order.
    ///
    /// Days without a file, or with a file that cannot be read, are skipped
    /// with a warning.
    pub async fn stored_ticks(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        feed: TickFeed,
    ) -> Result<Vec<Tick>, SyncError> {
        let symbol = normalize_symbol(symbol)?;
        let (first, last) = self.local_days(from, to)?;
        if !self.store.has_ticks_dir(&symbol, feed).await? {
            return Err(StoreError::SymbolDataNotFound {
                path: self.store.ticks_dir(&symbol, feed),
                symbol,
            }
            .into());
        }

        let range = DateRange::days(first, last).map_err(|_| SyncError::InvalidRange {
            from: first,
            to: last,
        })?;
        let mut out = Vec::new();
        for day in range.iter_days() {
            if self.options.skip_weekends && is_weekend(day) {
                continue;
            }
            match self.store.read_ticks_day(&symbol, feed, day).await {
                Ok(Some(ticks)) => out.extend(ticks),
                Ok(None) => warn!(%symbol, %feed, %day, "no stored ticks for day"),
                Err(err) => warn!(%symbol, %feed, %day, error = %err, "skipping unreadable tick file"),
            }
        }
        Ok(out)
    }
}
