//! Tick updates: one file per missing day, fetched by a bounded worker pool.
//!
//! ## Batch
//! - A producer feeds missing days into a bounded queue and closes it.
//! - `workers` tasks pull days until the queue drains or the batch is cancelled.
//! - Each worker reports `Ok(day)` or the first fatal error on a result channel.
//! - On the first error the shared token is cancelled: no new job starts, jobs
//!   already running finish their write.
//! - Every task is joined before the batch returns, whatever the outcome.
//!
//! Coverage is then rebuilt from the files on disk, not from the batch's own
//! bookkeeping, so leftovers from an earlier failed batch are listed too.

use std::sync::Arc;

use chrono::NaiveDate;
use market_data_ingestor::models::{
    date_range::DateRange,
    tick::{Tick, sort_ticks},
    time_of_day::TimeOfDay,
};
use market_data_ingestor::providers::HistoryProvider;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SyncOrchestrator, SyncOutcome, TickUpdateParams, normalize_symbol};
use crate::error::SyncError;
use crate::series::{SeriesKind, TickFeed};
use crate::store::JsonStore;
use crate::tz::yesterday;

type JobQueue = Arc<Mutex<mpsc::Receiver<NaiveDate>>>;
type Report = mpsc::UnboundedSender<Result<NaiveDate, SyncError>>;

impl SyncOrchestrator {
    /// Cache every missing day of ticks in `[from, to]`, `to` clamped to yesterday.
    ///
    /// # Errors
    /// - `InvalidParams` for an empty symbol, no feed or an inverted time window.
    /// - `InvalidRange` when `from` is after `to` once clamped.
    /// - The first fatal error of the batch. Coverage is then left unchanged.
    pub async fn update_ticks(&self, params: TickUpdateParams) -> Result<SyncOutcome, SyncError> {
        let symbol = normalize_symbol(&params.symbol)?;
        let feed = TickFeed::from_flags(params.trades, params.quotes).ok_or_else(|| {
            SyncError::InvalidParams("at least one of trades or quotes must be requested".into())
        })?;
        if params.start_time > params.end_time {
            return Err(SyncError::InvalidParams(format!(
                "start time {} is after end time {}",
                params.start_time, params.end_time
            )));
        }

        let (first, requested_last) = self.local_days(params.from, params.to)?;
        let last = requested_last.min(yesterday(self.clock.now(), self.options.time_zone));
        if first > last {
            return Err(SyncError::InvalidRange {
                from: first,
                to: last,
            });
        }

        let kind = SeriesKind::Ticks(feed);
        let mut tracker = self.load_tracker(&symbol, kind).await?;
        let range = DateRange::days(first, last).map_err(|_| SyncError::InvalidRange {
            from: first,
            to: last,
        })?;
        let missing = tracker.missing_dates(&range)?;
        if missing.is_empty() {
            info!(%symbol, %feed, %first, %last, "ticks already cached");
            return Ok(SyncOutcome::NothingToSync);
        }

        let days = missing.len();
        info!(%symbol, %feed, %first, %last, days, workers = self.options.workers, "tick sync started");

        let job = TickJob {
            provider: Arc::clone(&self.provider),
            store: self.store.clone(),
            symbol: symbol.clone(),
            feed,
            start: params.start_time,
            end: params.end_time,
        };
        if let Err(err) = self.run_batch(job, missing).await {
            warn!(%symbol, %feed, error = %err, "tick sync aborted, coverage unchanged");
            return Err(err);
        }

        let on_disk = self.store.stored_tick_days(&symbol, feed).await?;
        tracker.replace_listed(on_disk)?;
        self.store.save_meta(&tracker.to_meta()).await?;
        info!(%symbol, %feed, days, listed = tracker.len(), "tick sync finished");
        Ok(SyncOutcome::Synced { days })
    }

    async fn run_batch(&self, job: TickJob, days: Vec<NaiveDate>) -> Result<(), SyncError> {
        let cancel = CancellationToken::new();
        let (job_tx, job_rx) = mpsc::channel::<NaiveDate>(self.options.queue_capacity.max(1));
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        let producer_cancel = cancel.clone();
        tasks.spawn(async move {
            for day in days {
                tokio::select! {
                    biased;
                    _ = producer_cancel.cancelled() => break,
                    sent = job_tx.send(day) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let job = Arc::new(job);
        for worker in 0..self.options.workers.max(1) {
            tasks.spawn(run_worker(
                worker,
                Arc::clone(&job),
                Arc::clone(&job_rx),
                cancel.clone(),
                report_tx.clone(),
            ));
        }
        drop(report_tx);

        let mut failure = None;
        while let Some(report) = report_rx.recv().await {
            if let Err(err) = report {
                cancel.cancel();
                failure = Some(err);
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                cancel.cancel();
                if failure.is_none() {
                    failure = Some(SyncError::Worker(join_err));
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }
}

/// Everything a worker needs to sync one day.
struct TickJob {
    provider: Arc<dyn HistoryProvider>,
    store: JsonStore,
    symbol: String,
    feed: TickFeed,
    start: TimeOfDay,
    end: TimeOfDay,
}

impl TickJob {
    /// Fetch and persist one day. An empty vendor answer is stored as `[]`.
    async fn sync_day(&self, day: NaiveDate) -> Result<usize, SyncError> {
        let window = DateRange::window(day, self.start, self.end).map_err(|_| {
            SyncError::InvalidParams(format!("empty window {}..{}", self.start, self.end))
        })?;
        let fetched = self
            .provider
            .fetch_ticks(
                &self.symbol,
                window,
                self.feed.wants_trades(),
                self.feed.wants_quotes(),
            )
            .await;
        let ticks: Vec<Tick> = match fetched {
            Ok(mut ticks) => {
                sort_ticks(&mut ticks);
                ticks
            }
            Err(err) if err.is_soft() => {
                debug!(symbol = %self.symbol, %day, reason = %err, "no ticks for day");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };
        self.store
            .save_ticks(&self.symbol, self.feed, day, &ticks)
            .await?;
        Ok(ticks.len())
    }
}

async fn run_worker(
    worker: usize,
    job: Arc<TickJob>,
    queue: JobQueue,
    cancel: CancellationToken,
    report: Report,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                day = rx.recv() => day,
            }
        };
        let Some(day) = next else {
            break;
        };
        // A job dequeued as the token fired is dropped unstarted.
        if cancel.is_cancelled() {
            break;
        }

        match job.sync_day(day).await {
            Ok(count) => {
                debug!(worker, symbol = %job.symbol, %day, ticks = count, "day cached");
                if report.send(Ok(day)).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(worker, symbol = %job.symbol, %day, error = %err, "day failed");
                cancel.cancel();
                let _ = report.send(Err(err));
                break;
            }
        }
    }
}
