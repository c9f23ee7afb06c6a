//! Time zone parsing and conversion helpers.
//!
//! What this module provides:
//! - [`parse_tz`]: Parse an IANA time zone name (e.g. "America/New_York").
//! - [`parse_ts_to_utc`]: Parse RFC-3339 timestamps with an explicit offset and convert to UTC.
//! - [`parse_day_or_ts`]: Accept either a bare `YYYY-MM-DD` or an RFC-3339 timestamp at the CLI edge.
//! - [`local_day`]: The calendar day an instant falls on in the reference zone.
//! - [`yesterday`]: The last complete calendar day in the reference zone.
//! - [`local_midnight_utc`]: Start of a local calendar day as a UTC instant, also in
//!   zones whose midnight can be skipped or repeated.
//!
//! Notes:
//! - Cache partitions are keyed by *local* calendar day; a trade at 23:30 New York
//!   time belongs to that New York day even though it is the next UTC day.
//! - Nonexistent local times happen during "spring forward" when a wall time is skipped.
//!   A few zones (e.g. America/Santiago historically) skip midnight itself.
//!
//! Examples
//! - RFC-3339 with offset to UTC:
//!   "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - 2024-01-16T03:00:00Z in America/New_York is local day 2024-01-15.

use anyhow::Context;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// IANA name -> `Tz`.
pub fn parse_tz(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("bad tz {name}: {e}"))
}

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// `YYYY-MM-DD` is taken as local midnight in `tz`; anything else must be RFC-3339.
pub fn parse_day_or_ts(s: &str, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(day) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return local_midnight_utc(day, tz);
    }
    parse_ts_to_utc(s.trim())
}

/// Calendar day of `ts` in `tz`.
pub fn local_day(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// The day before the local day of `now`.
pub fn yesterday(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let today = local_day(now, tz);
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Convert a naive local timestamp to UTC in `tz`.
///
/// Ambiguous local times (fall-back) resolve to the earliest instant. Nonexistent
/// ones (spring-forward gap) shift forward a minute at a time until the first valid
/// instant, capped at 2 hours.
fn from_local_naive(naive: NaiveDateTime, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    use chrono::offset::LocalResult::*;
    match tz.from_local_datetime(&naive) {
        Single(dt) => Ok(dt.with_timezone(&Utc)),
        Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        None => {
            let mut t = naive;
            for _ in 0..120 {
                t += chrono::Duration::minutes(1);
                if let Single(dt) = tz.from_local_datetime(&t) {
                    return Ok(dt.with_timezone(&Utc));
                }
            }
            Err(anyhow::anyhow!("nonexistent local time {naive} in {tz}"))
        }
    }
}

/// UTC instant of local midnight on `day`.
pub fn local_midnight_utc(day: NaiveDate, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    from_local_naive(day.and_time(NaiveTime::MIN), tz)
}
