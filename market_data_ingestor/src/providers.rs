//! Provider abstraction for historical market data.
//!
//! This module defines the [`HistoryProvider`] trait, the capability the sync
//! engine depends on for fetching bars and ticks from a vendor. Each concrete
//! vendor client (currently [`activetick::ActiveTickProvider`]) implements it;
//! tests substitute in-memory doubles.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn HistoryProvider>`) so the caller never names the concrete client.
//!
//! Every failure surfaces as a [`ProviderError`]. The variants form a closed
//! set and [`ProviderError::class`] routes each one to exactly one
//! [`ErrorClass`], which is what retry and batch-abort decisions look at.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar::Bar, date_range::DateRange, granularity::Granularity, tick::Tick,
//! };
//! use market_data_ingestor::providers::{HistoryProvider, ProviderError};
//!
//! struct EmptyProvider;
//!
//! #[async_trait]
//! impl HistoryProvider for EmptyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _symbol: &str,
//!         _granularity: Granularity,
//!         _range: DateRange,
//!     ) -> Result<Vec<Bar>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn fetch_ticks(
//!         &self,
//!         _symbol: &str,
//!         _range: DateRange,
//!         _trades: bool,
//!         _quotes: bool,
//!     ) -> Result<Vec<Tick>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod activetick;
pub mod retry;
pub mod transport;

use std::fmt;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{
    bar::Bar, date_range::DateRange, granularity::Granularity, granularity::GranularityError,
    tick::Tick,
};

/// Trait for fetching historical bars and ticks from a market data vendor.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetches bars of the given granularity covering `range`.
    ///
    /// # Errors
    ///
    /// * `InvalidGranularity` - intraday minutes outside 1-60.
    /// * Any transport or parse failure, see [`ProviderError`].
    async fn fetch_bars(
        &self,
        symbol: &str,
        granularity: Granularity,
        range: DateRange,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// Fetches trades and/or quotes inside `range`.
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - neither trades nor quotes requested.
    /// * `EmptyResult` - the vendor had nothing for the window. Callers that
    ///   treat an empty day as valid should branch on [`ProviderError::is_soft`].
    async fn fetch_ticks(
        &self,
        symbol: &str,
        range: DateRange,
        trades: bool,
        quotes: bool,
    ) -> Result<Vec<Tick>, ProviderError>;
}

/// How a [`ProviderError`] should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Never retried; aborts the batch it occurs in.
    Fatal,
    /// A valid "no data" outcome.
    Soft,
    /// Worth another attempt.
    Transient,
}

/// Which record shape failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Bar,
    Tick,
    TickTime,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Bar => "bar",
            RecordKind::Tick => "tick",
            RecordKind::TickTime => "tick-time",
        })
    }
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `HistoryProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The vendor refused the connection or reports its own session down.
    #[snafu(display("Data source unreachable: {message}"))]
    SourceUnreachable {
        message: String,
        backtrace: Backtrace,
    },

    /// The request can never succeed as built.
    #[snafu(display("Invalid request: {message}"))]
    InvalidRequest {
        message: String,
        backtrace: Backtrace,
    },

    /// The bar granularity is outside what the vendor supports.
    #[snafu(display("Invalid granularity: {source}"))]
    InvalidGranularity {
        source: GranularityError,
        backtrace: Backtrace,
    },

    /// The vendor answered with something other than 200.
    #[snafu(display("Expected status 200, got {code} from {url}"))]
    UnexpectedStatus {
        code: u16,
        url: String,
        backtrace: Backtrace,
    },

    /// The vendor answered with its "no data" marker.
    #[snafu(display("Empty response from {url}"))]
    EmptyResult { url: String, backtrace: Backtrace },

    /// The payload handed to a parser was empty.
    #[snafu(display("Nothing to parse"))]
    EmptyPayload { backtrace: Backtrace },

    /// Timeout, reset or any failure not classified above.
    #[snafu(display("Request to {url} failed: {message}"))]
    Transient {
        url: String,
        message: String,
        backtrace: Backtrace,
    },

    /// The last transient failure after the retry ceiling was reached.
    #[snafu(display("Request to {url} failed after {attempts} attempts: {source}"))]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[snafu(source(from(ProviderError, Box::new)))]
        source: Box<ProviderError>,
    },

    /// A payload line that does not match the expected record layout.
    #[snafu(display("Can't parse `{line}` as {kind}"))]
    MalformedRecord {
        line: String,
        kind: RecordKind,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Single routing point for retry and abort decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::SourceUnreachable { .. }
            | ProviderError::InvalidRequest { .. }
            | ProviderError::InvalidGranularity { .. }
            | ProviderError::UnexpectedStatus { .. }
            | ProviderError::RetriesExhausted { .. }
            | ProviderError::MalformedRecord { .. } => ErrorClass::Fatal,
            ProviderError::EmptyResult { .. } | ProviderError::EmptyPayload { .. } => {
                ErrorClass::Soft
            }
            ProviderError::Transient { .. } => ErrorClass::Transient,
        }
    }

    pub fn is_soft(&self) -> bool {
        self.class() == ErrorClass::Soft
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use snafu::IntoError;

    use super::*;

    struct StaticProvider;

    #[async_trait]
    impl HistoryProvider for StaticProvider {
        async fn fetch_bars(
            &self,
            _symbol: &str,
            _granularity: Granularity,
            _range: DateRange,
        ) -> Result<Vec<Bar>, ProviderError> {
            Ok(vec![])
        }

        async fn fetch_ticks(
            &self,
            _symbol: &str,
            range: DateRange,
            _trades: bool,
            _quotes: bool,
        ) -> Result<Vec<Tick>, ProviderError> {
            EmptyResultSnafu {
                url: range.to_string(),
            }
            .fail()
        }
    }

    #[tokio::test]
    async fn provider_is_usable_as_trait_object() {
        let provider: Arc<dyn HistoryProvider> = Arc::new(StaticProvider);
        let day = DateRange::day(NaiveDate::from_ymd_opt(2018, 11, 1).unwrap());

        let bars = provider.fetch_bars("AAPL", Granularity::Daily, day).await;
        assert!(bars.unwrap().is_empty());

        let ticks = provider.fetch_ticks("AAPL", day, true, false).await;
        assert!(ticks.unwrap_err().is_soft());
    }

    #[test]
    fn classification_is_exhaustive_and_stable() {
        let fatal = SourceUnreachableSnafu { message: "down" }.build();
        assert_eq!(fatal.class(), ErrorClass::Fatal);

        let transient = TransientSnafu {
            url: "http://x",
            message: "reset",
        }
        .build();
        assert!(transient.is_retryable());

        let wrapped = RetriesExhaustedSnafu {
            url: "http://x",
            attempts: 3u32,
        }
        .into_error(transient);
        assert_eq!(wrapped.class(), ErrorClass::Fatal);
        assert!(wrapped.to_string().contains("after 3 attempts"));

        assert_eq!(EmptyPayloadSnafu.build().class(), ErrorClass::Soft);
        assert_eq!(
            MalformedRecordSnafu {
                line: "x,y",
                kind: RecordKind::TickTime
            }
            .build()
            .to_string(),
            "Can't parse `x,y` as tick-time"
        );
    }
}
