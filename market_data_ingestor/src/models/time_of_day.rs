//! Wall-clock time of day used to cut a trading day down to a sub-window.

use std::{fmt, str::FromStr};

use chrono::NaiveTime;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeOfDayError {
    #[error("Time of day out of range: {hour:02}:{minute:02}:{second:02}")]
    OutOfRange { hour: u32, minute: u32, second: u32 },

    #[error("Invalid time of day `{input}`, expected hh:mm or hh:mm:ss")]
    InvalidInput { input: String },
}

/// `hour:minute:second`, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
    second: u32,
}

impl TimeOfDay {
    /// 00:00:00
    pub const START_OF_DAY: TimeOfDay = TimeOfDay {
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// 23:59:59
    pub const END_OF_DAY: TimeOfDay = TimeOfDay {
        hour: 23,
        minute: 59,
        second: 59,
    };

    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, TimeOfDayError> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(TimeOfDayError::OutOfRange {
                hour,
                minute,
                second,
            });
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // fields are range-checked in `new`
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeOfDayError::InvalidInput {
            input: s.to_string(),
        };
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        TimeOfDay::new(nums[0], nums[1], nums[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_seconds() {
        assert_eq!("09:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(9, 30, 0).unwrap());
        assert_eq!(
            "16:00:05".parse::<TimeOfDay>().unwrap(),
            TimeOfDay::new(16, 0, 5).unwrap()
        );
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(matches!(
            TimeOfDay::new(24, 0, 0),
            Err(TimeOfDayError::OutOfRange { .. })
        ));
        assert!(matches!(
            "9".parse::<TimeOfDay>(),
            Err(TimeOfDayError::InvalidInput { .. })
        ));
        assert!(matches!(
            "aa:bb".parse::<TimeOfDay>(),
            Err(TimeOfDayError::InvalidInput { .. })
        ));
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(TimeOfDay::new(7, 5, 3).unwrap().to_string(), "07:05:03");
    }
}
