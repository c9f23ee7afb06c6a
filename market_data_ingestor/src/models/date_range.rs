//! Inclusive `[from, to]` range of wall-clock instants in the vendor's
//! reference zone.
//!
//! The vendor's wire timestamps carry no UTC offset, so both ends are naive.
//! Day-granular ranges have both ends at midnight; a range whose ends share a
//! date covers a single day.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::models::time_of_day::TimeOfDay;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Invalid range: from {from} is after to {to}")]
    InvalidRange {
        from: NaiveDateTime,
        to: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    from: NaiveDateTime,
    to: NaiveDateTime,
}

impl DateRange {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Result<Self, DateRangeError> {
        if from > to {
            return Err(DateRangeError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Midnight of `first` to midnight of `last`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Result<Self, DateRangeError> {
        Self::new(first.and_time(chrono::NaiveTime::MIN), last.and_time(chrono::NaiveTime::MIN))
    }

    pub fn day(date: NaiveDate) -> Self {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        Self {
            from: midnight,
            to: midnight,
        }
    }

    /// The `[start, end]` window of a single day.
    pub fn window(date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Result<Self, DateRangeError> {
        Self::new(
            date.and_time(start.to_naive_time()),
            date.and_time(end.to_naive_time()),
        )
    }

    pub fn from(&self) -> NaiveDateTime {
        self.from
    }

    pub fn to(&self) -> NaiveDateTime {
        self.to
    }

    pub fn first_day(&self) -> NaiveDate {
        self.from.date()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.to.date()
    }

    /// Number of calendar days touched, both ends included.
    pub fn day_count(&self) -> u64 {
        (self.last_day() - self.first_day()).num_days() as u64 + 1
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.first_day() <= day && day <= self.last_day()
    }

    /// Calendar days from the first to the last, inclusive.
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last_day();
        let mut next = Some(self.first_day());
        std::iter::from_fn(move || {
            let day = next.filter(|d| *d <= last)?;
            next = day.checked_add_days(Days::new(1));
            Some(day)
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
        write!(
            f,
            "From: {} To: {}",
            self.from.format(LAYOUT),
            self.to.format(LAYOUT)
        )
    }
}
