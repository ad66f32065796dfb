//! Random-walk generators behind the feed binary.
//!
//! [`BookSimulator`] walks a mid price and cuts tick-aligned snapshots from
//! it; [`PositionSimulator`] drifts a small net position so downstream
//! position plumbing sees changing data. Both take an explicit seed in tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tickbus::{BookLevel, OrderBookSnapshot, PositionInfo};

/// Largest mid move per snapshot, as a fraction.
const MAX_STEP_PCT: f64 = 0.005;
/// Band the per-level quantities are drawn from.
const MIN_LEVEL_QTY: f64 = 0.5;
const MAX_LEVEL_QTY: f64 = 5.0;
/// Largest position change per snapshot.
const MAX_QTY_STEP: f64 = 0.01;
/// The simulated position never grows past this, either way.
const QTY_CAP: f64 = 0.5;

/// Generates order book snapshots along a random walk.
pub struct BookSimulator {
    symbol: String,
    tick_size: f64,
    levels: usize,
    mid: f64,
    sequence: u32,
    rng: StdRng,
}

impl BookSimulator {
    pub fn new(symbol: impl Into<String>, tick_size: f64, levels: usize, start_price: f64) -> Self {
        Self::with_rng(symbol, tick_size, levels, start_price, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        symbol: impl Into<String>,
        tick_size: f64,
        levels: usize,
        start_price: f64,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            symbol,
            tick_size,
            levels,
            start_price,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        symbol: impl Into<String>,
        tick_size: f64,
        levels: usize,
        start_price: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            levels,
            mid: start_price,
            sequence: 0,
            rng,
        }
    }

    /// Advances the walk one step and cuts a snapshot.
    ///
    /// The best bid is the mid rounded down to the tick grid, the best ask
    /// sits one tick above it, and deeper levels fan out one tick at a time.
    pub fn next_book(&mut self, timestamp_us: i64) -> OrderBookSnapshot {
        let step = self.rng.gen_range(-MAX_STEP_PCT..MAX_STEP_PCT);
        // The floor keeps every bid level strictly positive.
        let floor = self.tick_size * (self.levels + 2) as f64;
        self.mid = (self.mid * (1.0 + step)).max(floor);
        self.sequence = self.sequence.wrapping_add(1);

        let best_bid = (self.mid / self.tick_size).floor() * self.tick_size;
        let best_ask = best_bid + self.tick_size;
        let mut book =
            OrderBookSnapshot::new(self.symbol.as_str(), self.sequence, timestamp_us);
        for level in 0..self.levels {
            let offset = level as f64 * self.tick_size;
            let bid_qty = self.rng.gen_range(MIN_LEVEL_QTY..MAX_LEVEL_QTY);
            let ask_qty = self.rng.gen_range(MIN_LEVEL_QTY..MAX_LEVEL_QTY);
            book.bids.push(BookLevel::new(best_bid - offset, bid_qty));
            book.asks.push(BookLevel::new(best_ask + offset, ask_qty));
        }
        book
    }

    /// Current walk value, between the grid-aligned best bid and ask.
    pub fn mid(&self) -> f64 {
        self.mid
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

/// Drifts a net position inside a fixed band.
pub struct PositionSimulator {
    exchange: String,
    symbol: String,
    qty: f64,
    rng: StdRng,
}

impl PositionSimulator {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            qty: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(exchange: impl Into<String>, symbol: impl Into<String>, seed: u64) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            qty: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Moves the position one step and snapshots it, marked at `mark_price`.
    pub fn next_position(&mut self, mark_price: f64, timestamp_us: i64) -> PositionInfo {
        let step = self.rng.gen_range(-MAX_QTY_STEP..MAX_QTY_STEP);
        self.qty = (self.qty + step).clamp(-QTY_CAP, QTY_CAP);
        PositionInfo {
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            qty: self.qty,
            avg_price: mark_price,
            unrealized_pnl: 0.0,
            timestamp_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbus_core::codec;

    #[test]
    fn levels_sit_on_the_tick_grid_in_order() {
        let mut sim = BookSimulator::with_seed("BTCUSDT", 0.5, 5, 50000.0, 1);
        let book = sim.next_book(7);

        assert_eq!(book.bids.len(), 5);
        assert_eq!(book.asks.len(), 5);
        let best_bid = book.bids[0].price;
        let best_ask = book.asks[0].price;
        assert!(best_bid < best_ask);
        assert_eq!(best_ask - best_bid, 0.5);
        assert!(best_bid <= sim.mid() && sim.mid() <= best_ask);
        for (level, (bid, ask)) in book.bids.iter().zip(book.asks.iter()).enumerate() {
            assert_eq!(bid.price, best_bid - level as f64 * 0.5);
            assert_eq!(ask.price, best_ask + level as f64 * 0.5);
            assert!(bid.qty >= MIN_LEVEL_QTY && bid.qty < MAX_LEVEL_QTY);
            assert!(ask.qty >= MIN_LEVEL_QTY && ask.qty < MAX_LEVEL_QTY);
        }
    }

    #[test]
    fn sequence_increments_by_one_per_snapshot() {
        let mut sim = BookSimulator::with_seed("BTCUSDT", 0.1, 2, 50000.0, 2);
        assert_eq!(sim.next_book(1).sequence, 1);
        assert_eq!(sim.next_book(2).sequence, 2);
        assert_eq!(sim.next_book(3).sequence, 3);
        assert_eq!(sim.sequence(), 3);
    }

    #[test]
    fn each_step_moves_the_mid_at_most_half_a_percent() {
        let mut sim = BookSimulator::with_seed("BTCUSDT", 0.1, 3, 50000.0, 3);
        let mut previous = 50000.0;
        for tick in 0..100 {
            sim.next_book(tick);
            let ratio = sim.mid() / previous - 1.0;
            assert!(
                ratio.abs() <= MAX_STEP_PCT + 1e-12,
                "step {} moved {}",
                tick,
                ratio
            );
            previous = sim.mid();
        }
    }

    #[test]
    fn deep_walks_never_cross_zero() {
        // Walk an almost worthless instrument downward for a long time.
        let mut sim = BookSimulator::with_seed("DUSTUSDT", 0.1, 5, 1.0, 4);
        for tick in 0..10_000 {
            let book = sim.next_book(tick);
            let deepest = book.bids.last().unwrap();
            assert!(deepest.price > 0.0, "bid {} at step {}", deepest.price, tick);
        }
    }

    #[test]
    fn generated_books_survive_the_wire_codec() {
        let mut sim = BookSimulator::with_seed("BTCUSDT", 0.5, 4, 50000.0, 5);
        let book = sim.next_book(99);
        let frame = codec::encode_book(&book).unwrap();
        assert_eq!(codec::decode_book(&frame).unwrap(), book);
    }

    #[test]
    fn the_same_seed_replays_the_same_stream() {
        let mut first = BookSimulator::with_seed("BTCUSDT", 0.1, 3, 50000.0, 42);
        let mut second = BookSimulator::with_seed("BTCUSDT", 0.1, 3, 50000.0, 42);
        for tick in 0..10 {
            assert_eq!(first.next_book(tick), second.next_book(tick));
        }
    }

    #[test]
    fn positions_drift_slowly_inside_the_cap() {
        let mut sim = PositionSimulator::with_seed("SIM", "BTCUSDT", 6);
        let mut previous = 0.0;
        for tick in 0..500 {
            let position = sim.next_position(50000.0, tick);
            assert_eq!(position.exchange, "SIM");
            assert_eq!(position.symbol, "BTCUSDT");
            assert_eq!(position.avg_price, 50000.0);
            assert!(position.qty.abs() <= QTY_CAP);
            assert!((position.qty - previous).abs() <= MAX_QTY_STEP + 1e-12);
            previous = position.qty;
        }
    }
}
