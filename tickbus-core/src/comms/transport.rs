//! Transport abstractions for the tickbus fan-out channels.

use anyhow::Result;

/// Abstraction for the outgoing side of a channel (publishing raw frames).
/// Implementation details (ZMQ, in-process memory) are hidden behind this
/// trait.
pub trait BusPublisher: Send + Sync {
    /// Publishes one frame under the given topic.
    ///
    /// Publishing never blocks on slow consumers; frames beyond the transport
    /// watermark are dropped by the backend.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// The endpoint this publisher is bound to, after resolution.
    fn endpoint(&self) -> &str;
}

/// Abstraction for the incoming side of a channel (consuming raw frames).
pub trait BusSubscriber: Send {
    /// Returns the next pending frame without blocking, or `None` when the
    /// channel is empty.
    fn try_receive(&self) -> Result<Option<Vec<u8>>>;

    /// Waits up to `timeout_ms` for the next frame.
    ///
    /// Returns `None` on timeout so polling loops can check their shutdown
    /// flag between frames.
    fn receive_timeout(&self, timeout_ms: i64) -> Result<Option<Vec<u8>>>;

    /// The topic prefix this subscriber filters on.
    fn topic(&self) -> &str;
}
