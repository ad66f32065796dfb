//! Configuration for the strategy-host process.

use serde::{Deserialize, Serialize};
use tickbus_core::config::BusConfig;

use crate::strategies::MarketMakerConfig;

/// Everything the strategy-host process reads from its `-c` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyHostConfig {
    /// Exchange name orders are stamped with; must match the engine serving
    /// the order topic.
    pub exchange: String,
    #[serde(default)]
    pub bus: BusConfig,
    /// The hosted strategy.
    pub strategy: MarketMakerConfig,
    /// Local engine queue bound.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Local engine rate limit.
    #[serde(default = "default_max_orders_per_sec")]
    pub max_orders_per_sec: u32,
    /// Bus adapter request budget (orders and cancels combined).
    #[serde(default = "default_requests_per_min")]
    pub requests_per_min: u32,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_orders_per_sec() -> u32 {
    100
}

fn default_requests_per_min() -> u32 {
    1200
}

fn default_stats_interval_secs() -> u64 {
    30
}
