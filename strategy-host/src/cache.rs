//! Last-value cache for the position channel.
//!
//! Snapshots fully replace the previous value for their key; there is no
//! incremental merge. The container's position thread writes, strategy
//! callbacks and operator logs read.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tickbus::{AccountBalanceInfo, PositionInfo, PositionUpdate};

#[derive(Default)]
struct CacheInner {
    /// Keyed by (exchange, symbol).
    positions: HashMap<(String, String), PositionInfo>,
    /// Keyed by (exchange, asset).
    balances: HashMap<(String, String), AccountBalanceInfo>,
}

/// Thread-safe store of the latest position and balance per key.
#[derive(Default)]
pub struct PositionCache {
    inner: Mutex<CacheInner>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores one update, replacing whatever was held for its key.
    pub fn apply(&self, update: PositionUpdate) {
        let mut inner = self.lock();
        match update {
            PositionUpdate::Position(position) => {
                inner.positions.insert(
                    (position.exchange.clone(), position.symbol.clone()),
                    position,
                );
            }
            PositionUpdate::Balance(balance) => {
                inner
                    .balances
                    .insert((balance.exchange.clone(), balance.asset.clone()), balance);
            }
        }
    }

    pub fn position(&self, exchange: &str, symbol: &str) -> Option<PositionInfo> {
        self.lock()
            .positions
            .get(&(exchange.to_string(), symbol.to_string()))
            .cloned()
    }

    pub fn balance(&self, exchange: &str, asset: &str) -> Option<AccountBalanceInfo> {
        self.lock()
            .balances
            .get(&(exchange.to_string(), asset.to_string()))
            .cloned()
    }

    /// Net quantity for one instrument, zero when nothing has arrived yet.
    pub fn net_qty(&self, exchange: &str, symbol: &str) -> f64 {
        self.position(exchange, symbol)
            .map(|position| position.qty)
            .unwrap_or(0.0)
    }

    pub fn positions(&self) -> Vec<PositionInfo> {
        self.lock().positions.values().cloned().collect()
    }

    pub fn balances(&self) -> Vec<AccountBalanceInfo> {
        self.lock().balances.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.positions.len() + inner.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(exchange: &str, symbol: &str, qty: f64) -> PositionUpdate {
        PositionUpdate::Position(PositionInfo {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            qty,
            avg_price: 50000.0,
            unrealized_pnl: 0.0,
            timestamp_us: 1_700_000_000_000_000,
        })
    }

    fn balance(exchange: &str, asset: &str, total: f64) -> PositionUpdate {
        PositionUpdate::Balance(AccountBalanceInfo {
            exchange: exchange.to_string(),
            asset: asset.to_string(),
            total,
            available: total,
            locked: 0.0,
            timestamp_us: 1_700_000_000_000_000,
        })
    }

    #[test]
    fn a_newer_snapshot_replaces_the_old_one_wholesale() {
        let cache = PositionCache::new();
        cache.apply(position("SIM", "BTCUSDT", 0.5));
        cache.apply(position("SIM", "BTCUSDT", -0.2));

        let held = cache.position("SIM", "BTCUSDT").unwrap();
        assert_eq!(held.qty, -0.2);
        assert_eq!(cache.positions().len(), 1);
    }

    #[test]
    fn keys_are_per_exchange_and_symbol() {
        let cache = PositionCache::new();
        cache.apply(position("SIM", "BTCUSDT", 1.0));
        cache.apply(position("SIM", "ETHUSDT", 2.0));
        cache.apply(position("LIVE", "BTCUSDT", 3.0));

        assert_eq!(cache.net_qty("SIM", "BTCUSDT"), 1.0);
        assert_eq!(cache.net_qty("SIM", "ETHUSDT"), 2.0);
        assert_eq!(cache.net_qty("LIVE", "BTCUSDT"), 3.0);
        assert_eq!(cache.positions().len(), 3);
    }

    #[test]
    fn unknown_keys_read_as_flat() {
        let cache = PositionCache::new();
        assert_eq!(cache.net_qty("SIM", "BTCUSDT"), 0.0);
        assert!(cache.position("SIM", "BTCUSDT").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn balances_live_beside_positions() {
        let cache = PositionCache::new();
        cache.apply(balance("SIM", "USDT", 100_000.0));
        cache.apply(position("SIM", "BTCUSDT", 0.1));

        assert_eq!(cache.balance("SIM", "USDT").unwrap().total, 100_000.0);
        assert_eq!(cache.len(), 2);
        cache.apply(balance("SIM", "USDT", 95_000.0));
        assert_eq!(cache.balance("SIM", "USDT").unwrap().total, 95_000.0);
        assert_eq!(cache.len(), 2);
    }
}
