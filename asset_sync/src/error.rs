//! Errors surfaced by sync and readback operations.

use chrono::NaiveDate;
use market_data_ingestor::models::granularity::GranularityError;
use market_data_ingestor::providers::ProviderError;
use thiserror::Error;

use crate::coverage::CoverageError;
use crate::store::StoreError;

/// Failure of an update or readback. A failed update leaves coverage untouched.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Request parameters that cannot be acted on.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Intraday minutes outside 1-60.
    #[error(transparent)]
    InvalidGranularity(#[from] GranularityError),

    /// `from` falls after `to`, possibly only after clamping to yesterday.
    #[error("Invalid range: from {from} is after to {to}")]
    InvalidRange {
        /// First local day.
        from: NaiveDate,
        /// Last local day.
        to: NaiveDate,
    },

    /// Fatal vendor failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Cache I/O or decoding failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A day could not be tracked.
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    /// A batch task panicked.
    #[error("Sync worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
