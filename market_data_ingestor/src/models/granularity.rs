//! Bar granularity: daily, weekly, or an intraday bucket of 1 to 60 minutes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive bounds for intraday bucket sizes.
pub const INTRADAY_MINUTES: std::ops::RangeInclusive<u32> = 1..=60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GranularityError {
    #[error("Intraday minutes should be in range 1-60, got {minutes}")]
    InvalidMinutes { minutes: u32 },

    #[error("Can't recognize granularity `{input}`. Should be D, W or intraday minutes (1-60)")]
    InvalidInput { input: String },
}

/// Text form follows the vendor convention: `D`, `W`, or the minute count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Granularity {
    Daily,
    Weekly,
    /// Not range-checked here; use [`Granularity::intraday`] to validate.
    Intraday(u32),
}

impl Granularity {
    pub fn intraday(minutes: u32) -> Result<Self, GranularityError> {
        if !INTRADAY_MINUTES.contains(&minutes) {
            return Err(GranularityError::InvalidMinutes { minutes });
        }
        Ok(Granularity::Intraday(minutes))
    }

    /// Checks the intraday bound on values built from the raw variant.
    pub fn validate(self) -> Result<Self, GranularityError> {
        match self {
            Granularity::Intraday(m) => Granularity::intraday(m),
            other => Ok(other),
        }
    }

    /// Directory name used by the cache for this granularity.
    pub fn folder_name(&self) -> String {
        match self {
            Granularity::Daily => "day".to_string(),
            Granularity::Weekly => "week".to_string(),
            Granularity::Intraday(m) => format!("{m}min"),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Daily => f.write_str("D"),
            Granularity::Weekly => f.write_str("W"),
            Granularity::Intraday(m) => write!(f, "{m}"),
        }
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "D" | "d" => Ok(Granularity::Daily),
            "W" | "w" => Ok(Granularity::Weekly),
            other => {
                let minutes: u32 = other.parse().map_err(|_| GranularityError::InvalidInput {
                    input: s.to_string(),
                })?;
                Granularity::intraday(minutes)
            }
        }
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.to_string()
    }
}

impl TryFrom<String> for Granularity {
    type Error = GranularityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
