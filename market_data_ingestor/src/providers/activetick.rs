//! Client for the ActiveTick HTTP feed.
//!
//! The feed serves comma-separated text: `/barData` for OHLCV rows and
//! `/tickData` for tagged trade/quote rows. A body starting with `0` is the
//! feed's "no data" marker.

pub mod params;
pub mod provider;
pub mod response;

pub use params::ActiveTickConfig;
pub use provider::ActiveTickProvider;
