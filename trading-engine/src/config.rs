//! Configuration of the engine service.

use serde::{Deserialize, Serialize};
use tickbus_core::config::BusConfig;

use crate::adapter::SimAdapterConfig;

/// Top-level config, loaded from the JSON file given with `-c`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exchange name this engine trades against.
    pub exchange: String,
    #[serde(default)]
    pub bus: BusConfig,
    /// Capacity of the queue between order intake and the adapter worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Order budget per second; anything above it is rejected synthetically.
    #[serde(default = "default_max_orders_per_sec")]
    pub max_orders_per_sec: u32,
    #[serde(default)]
    pub adapter: SimAdapterConfig,
    /// Closed orders older than this are evicted from the order table.
    #[serde(default = "default_purge_after_secs")]
    pub purge_after_secs: u64,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_orders_per_sec() -> u32 {
    100
}

fn default_purge_after_secs() -> u64 {
    3600
}

fn default_stats_interval_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "exchange": "SIM" }"#).unwrap();
        assert_eq!(config.exchange, "SIM");
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.max_orders_per_sec, 100);
        assert_eq!(config.purge_after_secs, 3600);
        assert_eq!(config.adapter.fill_probability, 1.0);
        assert_eq!(config.bus.orders.topic, "ord.new");
    }

    #[test]
    fn full_config_round_trips() {
        let raw = r#"{
            "exchange": "SIM",
            "queue_capacity": 64,
            "max_orders_per_sec": 10,
            "adapter": {
                "fill_probability": 0.8,
                "reject_probability": 0.05,
                "response_delay_ms": 5,
                "reference_price": 42000.0
            },
            "purge_after_secs": 600,
            "stats_interval_secs": 5
        }"#;
        let config: EngineConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.adapter.fill_probability, 0.8);
        assert_eq!(config.adapter.reject_probability, 0.05);
        assert_eq!(config.adapter.reference_price, 42000.0);
        assert_eq!(config.stats_interval_secs, 5);
    }
}
