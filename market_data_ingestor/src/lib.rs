//! Vendor-facing half of the market data cache: record types, the
//! [`HistoryProvider`](providers::HistoryProvider) capability, and the
//! ActiveTick HTTP client that implements it.

pub mod models;
pub mod providers;
