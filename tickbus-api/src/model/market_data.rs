//! Market data models.
//!
//! An [`OrderBookSnapshot`] is a point-in-time copy of the top N levels of
//! one instrument's book. Snapshots are immutable once published; a consumer
//! replaces its previous copy wholesale.

use serde::{Deserialize, Serialize};

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub qty: f64,
}

impl BookLevel {
    pub fn new(price: f64, qty: f64) -> Self {
        Self { price, qty }
    }
}

/// Top-of-book or N-level market data for one exchange+symbol.
///
/// The producing exchange is identified by the topic the snapshot arrives on
/// (`md.<exchange>.<symbol>`), not by a field; the snapshot itself carries
/// only the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    /// Monotonically increasing per publisher.
    pub sequence: u32,
    /// Capture time, microseconds since the Unix epoch.
    pub timestamp_us: i64,
    /// Bid levels, best (highest) price first.
    pub bids: Vec<BookLevel>,
    /// Ask levels, best (lowest) price first.
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(symbol: impl Into<String>, sequence: u32, timestamp_us: i64) -> Self {
        Self {
            symbol: symbol.into(),
            sequence,
            timestamp_us,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }

    /// Midpoint of the best bid and ask, if both sides are present.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Best-ask price minus best-bid price, if both sides are present.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}
