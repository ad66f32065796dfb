//! Typed messaging on top of the raw transport.
//!
//! Serde values travel bincode-encoded on a single topic. Used for the
//! position channel, whose payloads are richer than the fixed-layout frames.

use std::marker::PhantomData;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::comms::transport::{BusPublisher, BusSubscriber};

/// Publishes values of one serde type on a fixed topic.
pub struct TypedPublisher<T: Serialize> {
    inner: Box<dyn BusPublisher>,
    topic: String,
    _marker: PhantomData<T>,
}

impl<T: Serialize> TypedPublisher<T> {
    pub fn new(inner: Box<dyn BusPublisher>, topic: impl Into<String>) -> Self {
        Self {
            inner,
            topic: topic.into(),
            _marker: PhantomData,
        }
    }

    pub fn publish(&self, message: &T) -> Result<()> {
        let payload = bincode::serialize(message).context("encoding typed message")?;
        self.inner.publish(&self.topic, &payload)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Receives values of one serde type from a raw subscriber.
pub struct TypedSubscriber<T: DeserializeOwned> {
    inner: Box<dyn BusSubscriber>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> TypedSubscriber<T> {
    pub fn new(inner: Box<dyn BusSubscriber>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn try_receive(&self) -> Result<Option<T>> {
        match self.inner.try_receive()? {
            Some(payload) => Ok(Some(decode(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn receive_timeout(&self, timeout_ms: i64) -> Result<Option<T>> {
        match self.inner.receive_timeout(timeout_ms)? {
            Some(payload) => Ok(Some(decode(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn topic(&self) -> &str {
        self.inner.topic()
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    bincode::deserialize(payload).context("decoding typed message")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::memory::MemoryBus;
    use tickbus::{PositionInfo, PositionUpdate};

    #[test]
    fn typed_round_trip_over_memory_bus() {
        let bus = MemoryBus::new();
        let subscriber: TypedSubscriber<PositionUpdate> =
            TypedSubscriber::new(Box::new(bus.subscriber("pos.")));
        let publisher: TypedPublisher<PositionUpdate> =
            TypedPublisher::new(Box::new(bus.publisher()), "pos.SIM.BTCUSDT");

        let update = PositionUpdate::Position(PositionInfo {
            exchange: "SIM".to_string(),
            symbol: "BTCUSDT".to_string(),
            qty: 0.4,
            avg_price: 50120.0,
            unrealized_pnl: -3.2,
            timestamp_us: 1_700_000_000_000_000,
        });
        publisher.publish(&update).unwrap();

        let received = subscriber.try_receive().unwrap();
        assert_eq!(received, Some(update));
    }

    #[test]
    fn garbage_payload_is_an_error_not_a_panic() {
        let bus = MemoryBus::new();
        let subscriber: TypedSubscriber<PositionUpdate> =
            TypedSubscriber::new(Box::new(bus.subscriber("pos.")));
        bus.publisher().publish("pos.SIM.BTCUSDT", &[0xff, 0xff]).unwrap();

        assert!(subscriber.try_receive().is_err());
    }
}
