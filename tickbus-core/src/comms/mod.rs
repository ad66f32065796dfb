//! Generic PUB/SUB plumbing for the tickbus channels.
//!
//! Every process that owns a channel binds a publisher for it; everyone else
//! connects subscribers. The [`transport`] traits keep the engine and the
//! strategy container independent of the backend, which is ZMQ in production
//! and [`memory`] in tests.

pub mod transport;
pub mod typed;
pub mod zmq;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use self::transport::{BusPublisher, BusSubscriber};
pub use self::typed::{TypedPublisher, TypedSubscriber};
pub use self::zmq::{ZmqPublisher, ZmqSubscriber};

#[cfg(any(test, feature = "test-utils"))]
pub use self::memory::{MemoryBus, MemoryPublisher, MemorySubscriber};

use anyhow::Result;

/// Binds a ZMQ publisher and boxes it behind the transport trait.
pub fn bind_publisher(endpoint: &str) -> Result<Box<dyn BusPublisher>> {
    Ok(Box::new(ZmqPublisher::bind(endpoint)?))
}

/// Connects a ZMQ subscriber and boxes it behind the transport trait.
pub fn connect_subscriber(endpoint: &str, topic: &str) -> Result<Box<dyn BusSubscriber>> {
    Ok(Box::new(ZmqSubscriber::connect(endpoint, topic)?))
}
