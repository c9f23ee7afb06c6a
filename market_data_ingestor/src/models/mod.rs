pub mod bar;
pub mod date_range;
pub mod granularity;
pub mod tick;
pub mod time_of_day;
