//! Cache partition keys: which series a coverage set and its files belong to.

use std::{fmt, str::FromStr};

use market_data_ingestor::models::granularity::{Granularity, GranularityError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesKindError {
    #[error("Invalid series kind: {input}")]
    InvalidInput { input: String },
    #[error(transparent)]
    Granularity(#[from] GranularityError),
}

/// Which tick streams were requested. Each combination is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickFeed {
    /// Trades only.
    Trades,
    /// Quotes only.
    Quotes,
    /// Both streams interleaved.
    QuotesTrades,
}

impl TickFeed {
    /// `None` when neither stream is wanted.
    pub fn from_flags(trades: bool, quotes: bool) -> Option<Self> {
        match (trades, quotes) {
            (true, true) => Some(TickFeed::QuotesTrades),
            (true, false) => Some(TickFeed::Trades),
            (false, true) => Some(TickFeed::Quotes),
            (false, false) => None,
        }
    }

    /// Trades are part of the feed.
    pub fn wants_trades(self) -> bool {
        matches!(self, TickFeed::Trades | TickFeed::QuotesTrades)
    }

    /// Quotes are part of the feed.
    pub fn wants_quotes(self) -> bool {
        matches!(self, TickFeed::Quotes | TickFeed::QuotesTrades)
    }

    /// Directory name used by the cache for this feed.
    pub fn folder_name(self) -> &'static str {
        match self {
            TickFeed::Trades => "trades",
            TickFeed::Quotes => "quotes",
            TickFeed::QuotesTrades => "quotes_trades",
        }
    }
}

impl fmt::Display for TickFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Persisted as `bars:<granularity>` or `ticks:<feed>`, e.g. `bars:D`, `ticks:quotes_trades`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SeriesKind {
    /// Bars of one granularity.
    Bars(Granularity),
    /// Ticks of one feed combination.
    Ticks(TickFeed),
}

impl SeriesKind {
    /// Directory name of the partition under `candles/` or `ticks/`.
    pub fn folder_name(&self) -> String {
        match self {
            SeriesKind::Bars(g) => g.folder_name(),
            SeriesKind::Ticks(feed) => feed.folder_name().to_string(),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::Bars(g) => write!(f, "bars:{g}"),
            SeriesKind::Ticks(feed) => write!(f, "ticks:{feed}"),
        }
    }
}

impl FromStr for SeriesKind {
    type Err = SeriesKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SeriesKindError::InvalidInput {
            input: s.to_string(),
        };
        let (kind, value) = s.trim().split_once(':').ok_or_else(invalid)?;
        match kind {
            "bars" => Ok(SeriesKind::Bars(value.parse()?)),
            "ticks" => {
                let feed = match value {
                    "trades" => TickFeed::Trades,
                    "quotes" => TickFeed::Quotes,
                    "quotes_trades" => TickFeed::QuotesTrades,
                    _ => return Err(invalid()),
                };
                Ok(SeriesKind::Ticks(feed))
            }
            _ => Err(invalid()),
        }
    }
}

impl From<SeriesKind> for String {
    fn from(kind: SeriesKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for SeriesKind {
    type Error = SeriesKindError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
