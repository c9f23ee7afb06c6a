//! Incremental cache of vendor market data.
//!
//! The engine keeps a local JSON cache of bars and ticks in step with a
//! [`HistoryProvider`](market_data_ingestor::providers::HistoryProvider), fetching
//! only the calendar days that coverage metadata does not list yet.
//!
//! - [`coverage`]: listed days per series and gap detection.
//! - [`sync`]: the orchestrator that fetches gaps and rewrites coverage.
//! - [`store`]: on-disk layout.
//! - [`config`]: TOML + environment configuration.

#![deny(missing_docs)]

pub mod calendar;
pub mod config;
pub mod coverage;
pub mod error;
pub mod series;
pub mod store;
pub mod sync;
pub mod tz;

pub use coverage::{CoverageMeta, CoverageTracker, Gaps};
pub use error::SyncError;
pub use series::{SeriesKind, TickFeed};
pub use store::JsonStore;
pub use sync::{BarsUpdateParams, SyncOptions, SyncOrchestrator, SyncOutcome, TickUpdateParams};
