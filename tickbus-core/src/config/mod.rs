//! JSON process configuration.
//!
//! Every service takes `-c <file>` and deserializes its own config struct;
//! the bus layout below is the part they all share. Endpoints come in a
//! bind/connect pair per channel because the owning process binds while
//! everyone else connects.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One fan-out channel: where its owner binds, where consumers connect, and
/// the topic (or topic prefix) frames travel under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub pub_endpoint: String,
    pub sub_endpoint: String,
    pub topic: String,
}

impl ChannelConfig {
    pub fn local(port: u16, topic: impl Into<String>) -> Self {
        Self {
            pub_endpoint: format!("tcp://127.0.0.1:{}", port),
            sub_endpoint: format!("tcp://127.0.0.1:{}", port),
            topic: topic.into(),
        }
    }
}

/// The four channels every tickbus deployment runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Order requests and cancel requests, strategy container to engine.
    #[serde(default = "default_orders_channel")]
    pub orders: ChannelConfig,
    /// Order lifecycle events, engine to everyone.
    #[serde(default = "default_events_channel")]
    pub order_events: ChannelConfig,
    /// Book snapshots, feed to everyone. The topic is a prefix; concrete
    /// topics are `md.{exch}.{symbol}`.
    #[serde(default = "default_market_data_channel")]
    pub market_data: ChannelConfig,
    /// Position and balance updates. Concrete topics are `pos.{exch}.{symbol}`.
    #[serde(default = "default_positions_channel")]
    pub positions: ChannelConfig,
}

impl BusConfig {
    /// The loopback layout used by the sample configs and the tests.
    pub fn default_local() -> Self {
        Self {
            orders: default_orders_channel(),
            order_events: default_events_channel(),
            market_data: default_market_data_channel(),
            positions: default_positions_channel(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::default_local()
    }
}

fn default_orders_channel() -> ChannelConfig {
    ChannelConfig::local(6002, "ord.new")
}

fn default_events_channel() -> ChannelConfig {
    ChannelConfig::local(6003, "ord.ev")
}

fn default_market_data_channel() -> ChannelConfig {
    ChannelConfig::local(6001, "md.")
}

fn default_positions_channel() -> ChannelConfig {
    ChannelConfig::local(6004, "pos.")
}

/// Market data topic for one instrument.
pub fn md_topic(exch: &str, symbol: &str) -> String {
    format!("md.{}.{}", exch, symbol)
}

/// Position topic for one instrument.
pub fn pos_topic(exch: &str, symbol: &str) -> String {
    format!("pos.{}.{}", exch, symbol)
}

/// Loads a JSON config file into any deserializable struct.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct DemoConfig {
        exchange: String,
        #[serde(default)]
        bus: BusConfig,
    }

    #[test]
    fn bus_defaults_fill_missing_channels() {
        let parsed: DemoConfig = serde_json::from_str(r#"{ "exchange": "SIM" }"#).unwrap();
        assert_eq!(parsed.exchange, "SIM");
        assert_eq!(parsed.bus.orders.pub_endpoint, "tcp://127.0.0.1:6002");
        assert_eq!(parsed.bus.order_events.topic, "ord.ev");
        assert_eq!(parsed.bus.market_data.sub_endpoint, "tcp://127.0.0.1:6001");
        assert_eq!(parsed.bus.positions.topic, "pos.");
    }

    #[test]
    fn explicit_channels_override_defaults() {
        let raw = r#"{
            "exchange": "SIM",
            "bus": {
                "orders": {
                    "pub_endpoint": "tcp://*:7002",
                    "sub_endpoint": "tcp://10.0.0.5:7002",
                    "topic": "ord.new"
                }
            }
        }"#;
        let parsed: DemoConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.bus.orders.pub_endpoint, "tcp://*:7002");
        assert_eq!(parsed.bus.orders.sub_endpoint, "tcp://10.0.0.5:7002");
        // Channels the file does not mention keep their defaults.
        assert_eq!(parsed.bus.order_events.sub_endpoint, "tcp://127.0.0.1:6003");
    }

    #[test]
    fn topics_follow_the_naming_scheme() {
        assert_eq!(md_topic("SIM", "BTCUSDT"), "md.SIM.BTCUSDT");
        assert_eq!(pos_topic("SIM", "ETHUSDT"), "pos.SIM.ETHUSDT");
    }

    #[test]
    fn load_reports_missing_files_with_the_path() {
        let err = load::<BusConfig>("/nonexistent/tickbus.json").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/tickbus.json"));
    }
}
