//! Day-id mapping for coverage bitmaps.
//!
//! - A day id is the date's ordinal counted from 0001-01-01 (day 1).
//! - Ids fit `u32`, which is what `RoaringBitmap` stores.
//! - Dates before year 1 have no id.
//!
//! All functions work on calendar dates already resolved in the reference zone.

use chrono::{Datelike, NaiveDate, Weekday};

/// Day id of `date`, or `None` for dates before 0001-01-01.
pub fn day_id(date: NaiveDate) -> Option<u32> {
    u32::try_from(date.num_days_from_ce()).ok().filter(|id| *id > 0)
}

/// Inverse of [`day_id`].
pub fn day_from_id(id: u32) -> Option<NaiveDate> {
    i32::try_from(id)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Largest calendar gap between two missing days that still counts as one run.
///
/// Friday to Monday is three days apart but contiguous in trading terms.
pub const fn merge_threshold(skip_weekends: bool) -> u32 {
    if skip_weekends { 3 } else { 1 }
}
