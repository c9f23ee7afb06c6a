//! Turning feed responses into records.
//!
//! [`classify`] maps one transport outcome onto the error taxonomy, and the
//! `parse_*` functions read the CSV-like payload:
//!
//! ```text
//! bars:   20181101000000,271.60,273.73,270.38,273.37,89496311
//! trade:  T,20120803153000551,616.550000,100,Y,0,14,0,0
//! quote:  Q,20120803153000133,616.540000,616.630000,2,1,B,Q,0
//! ```
//!
//! Rows are CRLF separated. A row without any comma is noise and skipped;
//! a row with commas but the wrong shape fails the whole payload.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use snafu::OptionExt;
use std::str::FromStr;

use crate::{
    models::{
        bar::Bar,
        tick::{Quote, Tick, Trade},
    },
    providers::{
        EmptyPayloadSnafu, EmptyResultSnafu, MalformedRecordSnafu, ProviderError, RecordKind,
        SourceUnreachableSnafu, TransientSnafu, UnexpectedStatusSnafu,
        transport::{TransportError, TransportResponse},
    },
};

const NO_DATA_MARKER: char = '0';
const DISCONNECTED_MARKER: &str = "client is not connected";
const BAR_FIELDS: usize = 6;
const TICK_FIELDS: usize = 9;
const MILLIS_DIGITS: usize = 3;

/// Maps a transport outcome to the raw payload or a classified error.
pub fn classify(
    outcome: Result<TransportResponse, TransportError>,
    url: &str,
) -> Result<String, ProviderError> {
    let response = match outcome {
        Ok(response) => response,
        Err(TransportError::ConnectionRefused(message)) => {
            return SourceUnreachableSnafu {
                message: format!("ActiveTick refused the connection ({message})"),
            }
            .fail();
        }
        Err(TransportError::Other(message)) => return TransientSnafu { url, message }.fail(),
    };

    if response.status != 200 {
        return UnexpectedStatusSnafu {
            code: response.status,
            url,
        }
        .fail();
    }

    if response.body.starts_with(NO_DATA_MARKER) {
        if response.body.contains(DISCONNECTED_MARKER) {
            return SourceUnreachableSnafu {
                message: "ActiveTick is not connected",
            }
            .fail();
        }
        return EmptyResultSnafu { url }.fail();
    }

    Ok(response.body)
}

fn malformed(line: &str, kind: RecordKind) -> ProviderError {
    MalformedRecordSnafu { line, kind }.build()
}

fn field<T: FromStr>(raw: &str, line: &str, kind: RecordKind) -> Result<T, ProviderError> {
    raw.trim().parse().map_err(|_| malformed(line, kind))
}

fn price(raw: &str, line: &str, kind: RecordKind) -> Result<f64, ProviderError> {
    let value: f64 = field(raw, line, kind)?;
    if !value.is_finite() {
        return Err(malformed(line, kind));
    }
    Ok(value)
}

/// Lines that carry at least one separator.
fn rows(raw: &str) -> Result<impl Iterator<Item = &str>, ProviderError> {
    if raw.trim().is_empty() {
        return EmptyPayloadSnafu.fail();
    }
    Ok(raw.lines().filter(|l| l.contains(',')))
}

pub fn parse_bars(raw: &str, time_format: &str) -> Result<Vec<Bar>, ProviderError> {
    let kind = RecordKind::Bar;
    let mut bars = Vec::new();
    for line in rows(raw)? {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != BAR_FIELDS {
            return Err(malformed(line, kind));
        }
        if fields[0].chars().all(|c| c == '0') {
            return Err(malformed(line, kind));
        }
        let timestamp = NaiveDateTime::parse_from_str(fields[0].trim(), time_format)
            .map_err(|_| malformed(line, kind))?
            .and_utc();
        let close = price(fields[4], line, kind)?;
        bars.push(Bar {
            timestamp,
            open: price(fields[1], line, kind)?,
            high: price(fields[2], line, kind)?,
            low: price(fields[3], line, kind)?,
            close,
            adj_close: close,
            volume: field(fields[5], line, kind)?,
            open_interest: 0,
        });
    }
    Ok(bars)
}

/// Reads `<time_format><3-digit millis>`, e.g. `20181101075308267`.
pub fn parse_tick_time(raw: &str, time_format: &str) -> Result<DateTime<Utc>, ProviderError> {
    let kind = RecordKind::TickTime;
    let raw = raw.trim();
    let split = raw
        .len()
        .checked_sub(MILLIS_DIGITS)
        .filter(|at| *at > 0 && raw.is_char_boundary(*at))
        .context(MalformedRecordSnafu { line: raw, kind })?;
    let (seconds, millis) = raw.split_at(split);
    if !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(raw, kind));
    }
    let base = NaiveDateTime::parse_from_str(seconds, time_format)
        .map_err(|_| malformed(raw, kind))?;
    let millis: i64 = millis.parse().map_err(|_| malformed(raw, kind))?;
    Ok((base + Duration::milliseconds(millis)).and_utc())
}

pub fn parse_ticks(raw: &str, time_format: &str) -> Result<Vec<Tick>, ProviderError> {
    let kind = RecordKind::Tick;
    let mut ticks = Vec::new();
    for line in rows(raw)? {
        let f: Vec<&str> = line.split(',').collect();
        if f.len() != TICK_FIELDS {
            return Err(malformed(line, kind));
        }
        let tick = match f[0].trim() {
            "T" => Tick::Trade(Trade {
                timestamp: parse_tick_time(f[1], time_format)?,
                price: price(f[2], line, kind)?,
                size: field(f[3], line, kind)?,
                exchange: f[4].to_string(),
                conditions: [f[5], f[6], f[7], f[8]].map(str::to_string),
            }),
            "Q" => Tick::Quote(Quote {
                timestamp: parse_tick_time(f[1], time_format)?,
                bid_price: price(f[2], line, kind)?,
                ask_price: price(f[3], line, kind)?,
                bid_size: field(f[4], line, kind)?,
                ask_size: field(f[5], line, kind)?,
                bid_exchange: f[6].to_string(),
                ask_exchange: f[7].to_string(),
                condition: f[8].to_string(),
            }),
            _ => return Err(malformed(line, kind)),
        };
        ticks.push(tick);
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;
    use crate::providers::{ErrorClass, activetick::params::WIRE_TIME_FORMAT};

    const URL: &str = "http://feed/barData";

    #[test]
    fn parses_reference_bar_row() {
        let bars = parse_bars(
            "20181101000000,271.60,273.73,270.38,273.37,89496311",
            WIRE_TIME_FORMAT,
        )
        .unwrap();
        assert_eq!(
            bars,
            vec![Bar {
                timestamp: Utc.with_ymd_and_hms(2018, 11, 1, 0, 0, 0).unwrap(),
                open: 271.60,
                high: 273.73,
                low: 270.38,
                close: 273.37,
                adj_close: 273.37,
                volume: 89_496_311,
                open_interest: 0,
            }]
        );
    }

    #[test]
    fn skips_rows_without_separator() {
        let raw = "20181101000000,1,2,0.5,1.5,10\r\n\r\nnoise\r\n20181102000000,1,2,0.5,1.5,11\r\n";
        let bars = parse_bars(raw, WIRE_TIME_FORMAT).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].volume, 11);
    }

    #[test]
    fn bar_failures_name_the_line() {
        for raw in [
            "20181101000000,1,2,3,4",
            "00000000000000,1,2,3,4,5",
            "20181101000000,x,2,3,4,5",
            "20181101000000,1,2,3,4,-5",
            "20181101000000,NaN,2,3,4,5",
            "2018110100000x,1,2,3,4,5",
        ] {
            let err = parse_bars(raw, WIRE_TIME_FORMAT).unwrap_err();
            match err {
                ProviderError::MalformedRecord { line, kind, .. } => {
                    assert_eq!(line, raw);
                    assert_eq!(kind, RecordKind::Bar);
                }
                other => panic!("unexpected {other:?} for {raw}"),
            }
        }
    }

    #[test]
    fn empty_payload_is_distinct() {
        assert!(matches!(
            parse_bars("", WIRE_TIME_FORMAT),
            Err(ProviderError::EmptyPayload { .. })
        ));
        assert!(matches!(
            parse_ticks("", WIRE_TIME_FORMAT),
            Err(ProviderError::EmptyPayload { .. })
        ));
    }

    #[test]
    fn tick_time_carries_milliseconds() {
        let t = parse_tick_time("20181101075308267", WIRE_TIME_FORMAT).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2018, 11, 1, 7, 53, 8).unwrap() + Duration::milliseconds(267));
        assert_eq!(t.nanosecond(), 267_000_000);
    }

    #[test]
    fn bad_tick_time_is_tick_time_kind() {
        for raw in ["2018110107530826x", "201811010753082", "267", "0000000000000000"] {
            let err = parse_tick_time(raw, WIRE_TIME_FORMAT).unwrap_err();
            assert!(
                matches!(err, ProviderError::MalformedRecord { kind: RecordKind::TickTime, .. }),
                "{raw}: {err:?}"
            );
        }
    }

    #[test]
    fn parses_trades_and_quotes() {
        let raw = "T,20120803153000551,616.550000,100,Y,0,14,0,0\r\nQ,20120803153000133,616.540000,616.630000,2,1,B,Q,0\r\n";
        let ticks = parse_ticks(raw, WIRE_TIME_FORMAT).unwrap();
        assert_eq!(ticks.len(), 2);

        match &ticks[0] {
            Tick::Trade(t) => {
                assert_eq!(t.price, 616.55);
                assert_eq!(t.size, 100);
                assert_eq!(t.exchange, "Y");
                assert_eq!(t.conditions, ["0", "14", "0", "0"].map(String::from));
            }
            other => panic!("expected trade, got {other:?}"),
        }
        match &ticks[1] {
            Tick::Quote(q) => {
                assert_eq!((q.bid_price, q.ask_price), (616.54, 616.63));
                assert_eq!((q.bid_size, q.ask_size), (2, 1));
                assert_eq!((q.bid_exchange.as_str(), q.ask_exchange.as_str()), ("B", "Q"));
                assert_eq!(q.condition, "0");
            }
            other => panic!("expected quote, got {other:?}"),
        }
        assert!(ticks.iter().all(Tick::is_valid));
    }

    #[test]
    fn tick_shape_errors() {
        let short = parse_ticks("T,20120803153000551,616.55,100", WIRE_TIME_FORMAT).unwrap_err();
        assert!(matches!(short, ProviderError::MalformedRecord { kind: RecordKind::Tick, .. }));

        let unknown_tag =
            parse_ticks("X,20120803153000551,1,1,1,1,1,1,1", WIRE_TIME_FORMAT).unwrap_err();
        assert!(matches!(unknown_tag, ProviderError::MalformedRecord { kind: RecordKind::Tick, .. }));

        let bad_time = parse_ticks("T,2012080315300055x,1,1,Y,0,0,0,0", WIRE_TIME_FORMAT).unwrap_err();
        assert!(matches!(bad_time, ProviderError::MalformedRecord { kind: RecordKind::TickTime, .. }));
    }

    #[test]
    fn classify_routes_every_outcome() {
        let refused = classify(Err(TransportError::ConnectionRefused("nope".into())), URL);
        assert!(matches!(refused, Err(ProviderError::SourceUnreachable { .. })));

        let reset = classify(Err(TransportError::Other("reset".into())), URL).unwrap_err();
        assert_eq!(reset.class(), ErrorClass::Transient);

        let status = classify(
            Ok(TransportResponse {
                status: 503,
                body: String::new(),
            }),
            URL,
        )
        .unwrap_err();
        match status {
            ProviderError::UnexpectedStatus { code, url, .. } => {
                assert_eq!(code, 503);
                assert_eq!(url, URL);
            }
            other => panic!("unexpected {other:?}"),
        }

        let empty = classify(Ok(TransportResponse::ok("0")), URL).unwrap_err();
        assert!(matches!(empty, ProviderError::EmptyResult { .. }));
        assert!(empty.is_soft());

        let disconnected =
            classify(Ok(TransportResponse::ok("0 client is not connected")), URL).unwrap_err();
        assert!(matches!(disconnected, ProviderError::SourceUnreachable { .. }));

        let body = classify(Ok(TransportResponse::ok("T,1")), URL).unwrap();
        assert_eq!(body, "T,1");
    }
}
