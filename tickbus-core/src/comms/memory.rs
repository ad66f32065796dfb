//! In-process bus backend for tests.
//!
//! Mirrors the PUB/SUB semantics of the ZMQ backend (topic-prefix filtering,
//! fan-out to every matching subscriber, no delivery to late joiners for
//! frames published before they subscribed) without touching the network.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::comms::transport::{BusPublisher, BusSubscriber};

struct Subscription {
    topic: String,
    sender: Sender<Vec<u8>>,
}

/// An in-process message hub. Publishers and subscribers created from the
/// same hub see each other; separate hubs are fully isolated.
#[derive(Clone, Default)]
pub struct MemoryBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher feeding this hub.
    pub fn publisher(&self) -> MemoryPublisher {
        MemoryPublisher {
            subscriptions: Arc::clone(&self.subscriptions),
            endpoint: "memory://bus".to_string(),
        }
    }

    /// Creates a subscriber on this hub filtering on the given topic prefix.
    pub fn subscriber(&self, topic: &str) -> MemorySubscriber {
        let (sender, receiver) = unbounded();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                topic: topic.to_string(),
                sender,
            });
        MemorySubscriber {
            topic: topic.to_string(),
            receiver,
        }
    }
}

/// Publishing half of a [`MemoryBus`].
pub struct MemoryPublisher {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    endpoint: String,
}

impl BusPublisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Dropped subscribers are pruned lazily on the next matching publish.
        subscriptions.retain(|subscription| {
            if !topic.starts_with(&subscription.topic) {
                return true;
            }
            subscription.sender.send(payload.to_vec()).is_ok()
        });
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Consuming half of a [`MemoryBus`].
pub struct MemorySubscriber {
    topic: String,
    receiver: Receiver<Vec<u8>>,
}

impl BusSubscriber for MemorySubscriber {
    fn try_receive(&self) -> Result<Option<Vec<u8>>> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn receive_timeout(&self, timeout_ms: i64) -> Result<Option<Vec<u8>>> {
        let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
