//! Trade and quote observations.
//!
//! A [`Tick`] is either a [`Trade`] or a [`Quote`]. Fields belonging to the
//! other variant do not exist on it, so the accessors on [`Tick`] return
//! `None` for them rather than a parsed zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A last-sale print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: i64,
    pub exchange: String,
    pub conditions: [String; 4],
}

/// A top-of-book update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: i64,
    pub ask_size: i64,
    pub bid_exchange: String,
    pub ask_exchange: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tick {
    Trade(Trade),
    Quote(Quote),
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Tick {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Tick::Trade(t) => t.timestamp,
            Tick::Quote(q) => q.timestamp,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        match self {
            Tick::Trade(t) => Some(t.price),
            Tick::Quote(_) => None,
        }
    }

    pub fn last_size(&self) -> Option<i64> {
        match self {
            Tick::Trade(t) => Some(t.size),
            Tick::Quote(_) => None,
        }
    }

    /// `(bid, ask)` when this is a quote.
    pub fn bid_ask(&self) -> Option<(f64, f64)> {
        match self {
            Tick::Quote(q) => Some((q.bid_price, q.ask_price)),
            Tick::Trade(_) => None,
        }
    }

    /// Price present and positive, size positive.
    pub fn has_trade(&self) -> bool {
        match self {
            Tick::Trade(t) => positive(t.price) && t.size > 0,
            Tick::Quote(_) => false,
        }
    }

    /// Both sides priced and sized.
    pub fn has_quote(&self) -> bool {
        match self {
            Tick::Quote(q) => {
                positive(q.bid_price) && positive(q.ask_price) && q.bid_size > 0 && q.ask_size > 0
            }
            Tick::Trade(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.has_trade() || self.has_quote()
    }
}

/// Stable sort by timestamp, oldest first.
pub fn sort_ticks(ticks: &mut [Tick]) {
    ticks.sort_by_key(Tick::timestamp);
}
