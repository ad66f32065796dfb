//! An [`ExchangeAdapter`] that talks to a remote engine over the bus.
//!
//! Orders are published as binary frames on the order topic; cancels travel
//! on the same topic as cancel-typed event frames, which the remote engine
//! tells apart by frame size. Order events coming back on the event topic are
//! pumped into the local engine's event channel by a background thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use tickbus::{
    AccountBalanceInfo, AdapterError, AdapterErrorKind, AdapterResult, ExchangeAdapter, Order,
    OrderEvent, OrderResponse, PositionInfo, Trade,
};

use crate::codec;
use crate::comms::{self, BusPublisher, BusSubscriber};
use crate::config::BusConfig;
use crate::oms::rate_limit::RateLimiter;

const EVENT_POLL_MS: i64 = 100;

/// Endpoints and topics for one bus adapter.
#[derive(Debug, Clone)]
pub struct BusAdapterConfig {
    /// Exchange name stamped on outbound orders and error messages.
    pub exchange: String,
    /// Endpoint this adapter binds its order publisher to.
    pub orders_pub_endpoint: String,
    /// Endpoint of the remote engine's event publisher.
    pub events_sub_endpoint: String,
    pub order_topic: String,
    pub event_topic: String,
    /// Outbound request budget per minute (orders and cancels combined).
    pub requests_per_min: u32,
}

impl BusAdapterConfig {
    /// Builds an adapter config from the shared bus layout.
    pub fn new(exchange: impl Into<String>, bus: &BusConfig) -> Self {
        Self {
            exchange: exchange.into(),
            orders_pub_endpoint: bus.orders.pub_endpoint.clone(),
            events_sub_endpoint: bus.order_events.sub_endpoint.clone(),
            order_topic: bus.orders.topic.clone(),
            event_topic: bus.order_events.topic.clone(),
            requests_per_min: 1200,
        }
    }

    pub fn with_requests_per_min(mut self, requests_per_min: u32) -> Self {
        self.requests_per_min = requests_per_min;
        self
    }
}

/// Order gateway half of a strategy container.
///
/// Positions, balances and historic fills are not served here; the container
/// reads them from the position channel instead.
pub struct BusAdapter {
    config: BusAdapterConfig,
    events_tx: Sender<OrderEvent>,
    publisher: Option<Box<dyn BusPublisher>>,
    pump: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    limiter: RateLimiter,
    sequence: AtomicU32,
    orders_sent: AtomicU64,
    cancels_sent: AtomicU64,
    events_pumped: Arc<AtomicU64>,
}

impl BusAdapter {
    /// Creates a disconnected adapter. Events received after connecting are
    /// pushed into `events_tx`.
    pub fn new(config: BusAdapterConfig, events_tx: Sender<OrderEvent>) -> Self {
        let limiter = RateLimiter::per_minute(config.requests_per_min);
        Self {
            config,
            events_tx,
            publisher: None,
            pump: None,
            running: Arc::new(AtomicBool::new(false)),
            limiter,
            sequence: AtomicU32::new(0),
            orders_sent: AtomicU64::new(0),
            cancels_sent: AtomicU64::new(0),
            events_pumped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wires the adapter onto explicit transports instead of the configured
    /// ZMQ endpoints. This is how tests run it on the in-process bus.
    pub fn connect_with(
        &mut self,
        publisher: Box<dyn BusPublisher>,
        events_sub: Box<dyn BusSubscriber>,
    ) -> AdapterResult<bool> {
        if self.is_connected() {
            return Ok(true);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let events_tx = self.events_tx.clone();
        let pumped = Arc::clone(&self.events_pumped);
        let pump = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match events_sub.receive_timeout(EVENT_POLL_MS) {
                    Ok(Some(frame)) => match codec::decode_order_event(&frame) {
                        Ok(event) => {
                            pumped.fetch_add(1, Ordering::Relaxed);
                            if events_tx.send(event).is_err() {
                                debug!("event channel closed, stopping pump");
                                break;
                            }
                        }
                        Err(e) => warn!("dropping undecodable event frame: {}", e),
                    },
                    Ok(None) => {}
                    Err(e) => warn!("event subscription error: {}", e),
                }
            }
        });

        self.publisher = Some(publisher);
        self.pump = Some(pump);
        info!(
            "bus adapter for {} connected (orders on {})",
            self.config.exchange, self.config.order_topic
        );
        Ok(true)
    }

    fn publisher(&self, operation: &str) -> AdapterResult<&dyn BusPublisher> {
        match self.publisher.as_deref() {
            Some(publisher) => Ok(publisher),
            None => Err(AdapterError::not_connected(
                self.config.exchange.as_str(),
                operation,
            )),
        }
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl ExchangeAdapter for BusAdapter {
    fn exchange(&self) -> &str {
        &self.config.exchange
    }

    fn connect(&mut self) -> AdapterResult<bool> {
        if self.is_connected() {
            return Ok(true);
        }
        let publisher = comms::bind_publisher(&self.config.orders_pub_endpoint).map_err(|e| {
            AdapterError::new(
                AdapterErrorKind::ConfigError,
                self.config.exchange.as_str(),
                "connect",
                format!("order publisher: {}", e),
            )
        })?;
        let events_sub = comms::connect_subscriber(
            &self.config.events_sub_endpoint,
            &self.config.event_topic,
        )
        .map_err(|e| {
            AdapterError::new(
                AdapterErrorKind::ConfigError,
                self.config.exchange.as_str(),
                "connect",
                format!("event subscriber: {}", e),
            )
        })?;
        self.connect_with(publisher, events_sub)
    }

    fn disconnect(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!("event pump panicked");
            }
        }
        self.publisher = None;
    }

    fn is_connected(&self) -> bool {
        self.publisher.is_some()
    }

    fn send_order(&mut self, order: &Order) -> AdapterResult<OrderResponse> {
        let publisher = self.publisher("send_order")?;
        if !self.limiter.try_acquire() {
            return Err(AdapterError::rate_limited(
                self.config.exchange.as_str(),
                "send_order",
            ));
        }
        let frame = codec::encode_order(order, self.next_sequence()).map_err(|e| {
            AdapterError::new(
                AdapterErrorKind::ParseError,
                self.config.exchange.as_str(),
                "send_order",
                e.to_string(),
            )
        })?;
        publisher
            .publish(&self.config.order_topic, &frame)
            .map_err(|e| {
                AdapterError::new(
                    AdapterErrorKind::ApiError,
                    self.config.exchange.as_str(),
                    "send_order",
                    format!("publish failed: {}", e),
                )
            })?;
        self.orders_sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            "order {} published on {}",
            order.cl_ord_id, self.config.order_topic
        );
        Ok(OrderResponse::pending(
            order.cl_ord_id.as_str(),
            Utc::now().timestamp_micros(),
        ))
    }

    fn cancel_order(&mut self, cl_ord_id: &str, _exchange_order_id: &str) -> AdapterResult<bool> {
        let publisher = self.publisher("cancel_order")?;
        if !self.limiter.try_acquire() {
            return Err(AdapterError::rate_limited(
                self.config.exchange.as_str(),
                "cancel_order",
            ));
        }
        let request = OrderEvent::cancel(
            cl_ord_id,
            self.config.exchange.as_str(),
            "",
            Utc::now().timestamp_micros(),
        );
        let frame = codec::encode_order_event(&request, self.next_sequence()).map_err(|e| {
            AdapterError::new(
                AdapterErrorKind::ParseError,
                self.config.exchange.as_str(),
                "cancel_order",
                e.to_string(),
            )
        })?;
        publisher
            .publish(&self.config.order_topic, &frame)
            .map_err(|e| {
                AdapterError::new(
                    AdapterErrorKind::ApiError,
                    self.config.exchange.as_str(),
                    "cancel_order",
                    format!("publish failed: {}", e),
                )
            })?;
        self.cancels_sent.fetch_add(1, Ordering::Relaxed);
        debug!("cancel for {} published", cl_ord_id);
        Ok(true)
    }

    fn modify_order(
        &mut self,
        cl_ord_id: &str,
        _exchange_order_id: &str,
        _new_price: f64,
        _new_qty: f64,
    ) -> AdapterResult<bool> {
        Err(AdapterError::new(
            AdapterErrorKind::ApiError,
            self.config.exchange.as_str(),
            "modify_order",
            format!("no modify on the order bus; cancel {} and place anew", cl_ord_id),
        ))
    }

    fn positions(&self) -> AdapterResult<Vec<PositionInfo>> {
        Ok(Vec::new())
    }

    fn balances(&self) -> AdapterResult<Vec<AccountBalanceInfo>> {
        Ok(Vec::new())
    }

    fn open_orders(&self) -> AdapterResult<Vec<Order>> {
        Ok(Vec::new())
    }

    fn trade_history(&self) -> AdapterResult<Vec<Trade>> {
        Ok(Vec::new())
    }

    fn health(&self) -> HashMap<String, String> {
        let mut health = HashMap::new();
        health.insert("exchange".to_string(), self.config.exchange.clone());
        health.insert("connected".to_string(), self.is_connected().to_string());
        health.insert("order_topic".to_string(), self.config.order_topic.clone());
        health
    }

    fn metrics(&self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        metrics.insert(
            "orders_sent".to_string(),
            self.orders_sent.load(Ordering::Relaxed) as f64,
        );
        metrics.insert(
            "cancels_sent".to_string(),
            self.cancels_sent.load(Ordering::Relaxed) as f64,
        );
        metrics.insert(
            "events_pumped".to_string(),
            self.events_pumped.load(Ordering::Relaxed) as f64,
        );
        metrics.insert("rate_remaining".to_string(), self.limiter.remaining() as f64);
        metrics
    }
}

impl Drop for BusAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}
