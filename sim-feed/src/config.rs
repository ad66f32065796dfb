//! Configuration of the feed service.

use serde::{Deserialize, Serialize};
use tickbus_core::config::BusConfig;

/// Top-level config, loaded from the JSON file given with `-c`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Exchange name stamped on topics and position snapshots.
    pub exchange: String,
    /// Instrument the feed simulates.
    pub symbol: String,
    #[serde(default)]
    pub bus: BusConfig,
    /// Mid price the random walk starts from.
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    /// Grid the book levels sit on.
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    /// Levels per side in every snapshot.
    #[serde(default = "default_levels")]
    pub levels: usize,
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
    /// A position snapshot goes out every this many book snapshots.
    #[serde(default = "default_position_every")]
    pub position_every: u64,
}

fn default_start_price() -> f64 {
    50000.0
}

fn default_tick_size() -> f64 {
    0.1
}

fn default_levels() -> usize {
    5
}

fn default_publish_interval_ms() -> u64 {
    250
}

fn default_position_every() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: FeedConfig =
            serde_json::from_str(r#"{ "exchange": "SIM", "symbol": "BTCUSDT" }"#).unwrap();
        assert_eq!(config.exchange, "SIM");
        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.start_price, 50000.0);
        assert_eq!(config.tick_size, 0.1);
        assert_eq!(config.levels, 5);
        assert_eq!(config.publish_interval_ms, 250);
        assert_eq!(config.position_every, 20);
        assert_eq!(config.bus.market_data.topic, "md.");
    }

    #[test]
    fn full_config_parses_every_knob() {
        let raw = r#"{
            "exchange": "SIM",
            "symbol": "ETHUSDT",
            "start_price": 3000.0,
            "tick_size": 0.01,
            "levels": 10,
            "publish_interval_ms": 50,
            "position_every": 4
        }"#;
        let config: FeedConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.symbol, "ETHUSDT");
        assert_eq!(config.start_price, 3000.0);
        assert_eq!(config.tick_size, 0.01);
        assert_eq!(config.levels, 10);
        assert_eq!(config.publish_interval_ms, 50);
        assert_eq!(config.position_every, 4);
    }
}
