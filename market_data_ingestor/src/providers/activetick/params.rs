use std::time::Duration;

use snafu::ResultExt;

use crate::{
    models::{date_range::DateRange, granularity::Granularity},
    providers::{InvalidGranularitySnafu, InvalidRequestSnafu, ProviderError, retry::RetryPolicy},
};

/// Port the feed listens on by default; it is left out of the base URL.
pub const DEFAULT_PORT: u16 = 84;

/// Fixed-width timestamp layout used on the wire (`YYYYMMDDhhmmss`).
pub const WIRE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Connection and request settings for [`ActiveTickProvider`](super::ActiveTickProvider).
#[derive(Debug, Clone)]
pub struct ActiveTickConfig {
    pub host: String,
    /// `0` or [`DEFAULT_PORT`] mean "no explicit port".
    pub port: u16,
    pub retry: RetryPolicy,
    /// Upper bound for a single HTTP attempt.
    pub timeout: Duration,
    /// chrono layout for `beginTime`/`endTime` and for parsing row timestamps.
    pub time_format: String,
}

impl Default for ActiveTickConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            time_format: WIRE_TIME_FORMAT.to_string(),
        }
    }
}

impl ActiveTickConfig {
    pub fn base_url(&self) -> String {
        let mut url = format!("http://{}", self.host);
        if self.port != 0 && self.port != DEFAULT_PORT {
            url.push_str(&format!(":{}", self.port));
        }
        url
    }
}

/// `historyType` code plus `intradayMinutes` when applicable.
fn history_type(granularity: Granularity) -> Result<(u8, Option<u32>), ProviderError> {
    let granularity = granularity.validate().context(InvalidGranularitySnafu)?;
    Ok(match granularity {
        Granularity::Intraday(minutes) => (0, Some(minutes)),
        Granularity::Daily => (1, None),
        Granularity::Weekly => (2, None),
    })
}

fn check_symbol(symbol: &str) -> Result<String, ProviderError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return InvalidRequestSnafu {
            message: "Symbol not specified",
        }
        .fail();
    }
    Ok(symbol.to_ascii_uppercase())
}

/// Path and query for a bar request.
pub fn bars_uri(
    symbol: &str,
    granularity: Granularity,
    range: &DateRange,
    time_format: &str,
) -> Result<String, ProviderError> {
    let symbol = check_symbol(symbol)?;
    let (code, minutes) = history_type(granularity)?;
    let begin = range.from().format(time_format);
    let end = range.to().format(time_format);
    Ok(match minutes {
        Some(m) => format!(
            "/barData?symbol={symbol}&historyType={code}&intradayMinutes={m}&beginTime={begin}&endTime={end}"
        ),
        None => format!("/barData?symbol={symbol}&historyType={code}&beginTime={begin}&endTime={end}"),
    })
}

/// Path and query for a tick request.
pub fn ticks_uri(
    symbol: &str,
    range: &DateRange,
    trades: bool,
    quotes: bool,
    time_format: &str,
) -> Result<String, ProviderError> {
    let symbol_checked = check_symbol(symbol)?;
    if !trades && !quotes {
        return InvalidRequestSnafu {
            message: format!(
                "Should be selected trades, quotes or both (symbol: {symbol_checked}, range: {range})"
            ),
        }
        .fail();
    }
    let begin = range.from().format(time_format);
    let end = range.to().format(time_format);
    Ok(format!(
        "/tickData?symbol={symbol_checked}&trades={}&quotes={}&beginTime={begin}&endTime={end}",
        u8::from(trades),
        u8::from(quotes)
    ))
}
