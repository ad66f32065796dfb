//! ZMQ PUB/SUB backend for the bus traits.
//!
//! Every channel owner binds its own PUB socket and any number of consumers
//! connect SUB sockets to it. Binding to a wildcard port (`tcp://127.0.0.1:*`)
//! is supported; the resolved endpoint is available through
//! [`BusPublisher::endpoint`] so tests never race over fixed ports.

use std::cell::Cell;
use std::sync::Mutex;

use anyhow::{anyhow, Context as _, Result};
use log::warn;
use zmq::{Context, Socket, SocketType};

use crate::comms::transport::{BusPublisher, BusSubscriber};

/// Outbound high-water mark per PUB socket. Frames beyond this are dropped
/// for the lagging subscriber rather than blocking the publisher.
pub const SEND_HWM: i32 = 1000;

/// A ZMQ PUB socket bound to one endpoint.
pub struct ZmqPublisher {
    socket: Mutex<Socket>,
    endpoint: String,
}

impl ZmqPublisher {
    /// Binds a publisher to the specified address.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The address to bind to (e.g., "tcp://127.0.0.1:6001").
    pub fn bind(endpoint: &str) -> Result<Self> {
        let context = Context::new();
        let socket = context.socket(SocketType::PUB)?;
        socket.set_sndhwm(SEND_HWM)?;
        socket
            .bind(endpoint)
            .with_context(|| format!("binding publisher to {}", endpoint))?;
        let resolved = socket
            .get_last_endpoint()?
            .map_err(|_| anyhow!("bound endpoint is not printable"))?;
        Ok(Self {
            socket: Mutex::new(socket),
            endpoint: resolved,
        })
    }
}

impl BusPublisher for ZmqPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        socket
            .send_multipart([topic.as_bytes(), payload], 0)
            .with_context(|| format!("publishing on {}", topic))?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// A ZMQ SUB socket connected to one endpoint with a single topic-prefix
/// filter.
pub struct ZmqSubscriber {
    socket: Socket,
    topic: String,
    timeout_ms: Cell<i64>,
}

impl ZmqSubscriber {
    /// Connects a subscriber to the specified address.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The address to connect to (e.g., "tcp://127.0.0.1:6001").
    /// * `topic` - The topic prefix to subscribe to; `""` receives everything.
    pub fn connect(endpoint: &str, topic: &str) -> Result<Self> {
        let context = Context::new();
        let socket = context.socket(SocketType::SUB)?;
        socket
            .connect(endpoint)
            .with_context(|| format!("connecting subscriber to {}", endpoint))?;
        socket.set_subscribe(topic.as_bytes())?;
        Ok(Self {
            socket,
            topic: topic.to_string(),
            timeout_ms: Cell::new(-2),
        })
    }

    fn recv_payload(&self, flags: i32) -> Result<Option<Vec<u8>>> {
        match self.socket.recv_multipart(flags) {
            Ok(mut parts) => {
                if parts.len() != 2 {
                    warn!(
                        "dropping frame with {} parts on topic {}",
                        parts.len(),
                        self.topic
                    );
                    return Ok(None);
                }
                Ok(parts.pop())
            }
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("receiving on topic {}", self.topic)),
        }
    }
}

impl BusSubscriber for ZmqSubscriber {
    fn try_receive(&self) -> Result<Option<Vec<u8>>> {
        self.recv_payload(zmq::DONTWAIT)
    }

    fn receive_timeout(&self, timeout_ms: i64) -> Result<Option<Vec<u8>>> {
        if self.timeout_ms.get() != timeout_ms {
            self.socket.set_rcvtimeo(timeout_ms as i32)?;
            self.timeout_ms.set(timeout_ms);
        }
        self.recv_payload(0)
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
