//! The reusable trading engine: one adapter, one order table, one event
//! loop.
//!
//! The engine runs the same way in both deployments. The engine service
//! wires it to a simulated exchange adapter, subscribes it to the order
//! topic and republishes applied events; a strategy container wires it to a
//! bus adapter, skips the bus subscription and taps events into the local
//! strategy instead. Everything in between (validation, rate limiting, the
//! order table, synthetic rejects) is identical.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use tickbus::{Error, ExchangeAdapter, Order, OrderEvent, OrderEventType, OrderType};

use crate::codec::{self, CL_ORD_ID_CAP, EXCH_CAP, ORDER_EVENT_SIZE, ORDER_SIZE, SYMBOL_CAP, TEXT_CAP};
use crate::comms::{BusPublisher, BusSubscriber};
use crate::oms::rate_limit::RateLimiter;
use crate::oms::state::OrderState;
use crate::oms::table::{ApplyOutcome, OrderTable, TrackedOrder};

/// Reject text used when the engine's own rate limiter refuses an order.
pub const RATE_LIMIT_REJECT_TEXT: &str = "Rate limit exceeded";
/// Reject text used when the request queue is full.
pub const QUEUE_FULL_REJECT_TEXT: &str = "Engine queue full";

/// Tunables of one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Exchange name, stamped on synthetic events.
    pub exchange: String,
    /// Capacity of the request queue between callers and the adapter worker.
    pub queue_capacity: usize,
    /// Order budget per second enforced before anything reaches the adapter.
    pub max_orders_per_sec: u32,
    /// Poll interval of every engine loop; shutdown latency is bounded by it.
    pub poll_interval_ms: u64,
}

impl EngineSettings {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            ..Self::default()
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_orders_per_sec(mut self, max_orders_per_sec: u32) -> Self {
        self.max_orders_per_sec = max_orders_per_sec;
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            exchange: "SIM".to_string(),
            queue_capacity: 1024,
            max_orders_per_sec: 100,
            poll_interval_ms: 100,
        }
    }
}

/// Optional bus attachments of an engine.
pub struct EngineWiring {
    /// Subscription to the order topic; the engine service sets this to
    /// accept orders from remote strategy containers.
    pub orders_sub: Option<Box<dyn BusSubscriber>>,
    /// Publisher for applied events; the engine service sets this.
    pub events_pub: Option<Box<dyn BusPublisher>>,
    /// Topic applied events are republished under.
    pub event_topic: String,
    /// In-process copy of applied events; a strategy container sets this to
    /// feed its strategy without republishing.
    pub event_tap: Option<Sender<OrderEvent>>,
}

impl Default for EngineWiring {
    fn default() -> Self {
        Self {
            orders_sub: None,
            events_pub: None,
            event_topic: "ord.ev".to_string(),
            event_tap: None,
        }
    }
}

/// Monotonic counters for one engine instance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    /// Orders accepted into the lifecycle (including those later rejected).
    pub received: u64,
    /// Orders the adapter accepted.
    pub submitted: u64,
    pub filled: u64,
    pub cancelled: u64,
    pub rejected: u64,
    /// Events republished on the bus.
    pub events_published: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} submitted={} filled={} cancelled={} rejected={} events={}",
            self.received, self.submitted, self.filled, self.cancelled, self.rejected,
            self.events_published
        )
    }
}

enum EngineRequest {
    Submit(Order),
    Cancel { cl_ord_id: String },
}

struct Boot {
    adapter: Box<dyn ExchangeAdapter>,
    events_rx: Receiver<OrderEvent>,
    wiring: EngineWiring,
}

/// The engine itself. Construct with [`TradingEngine::new`], wrap in an
/// [`Arc`], call [`TradingEngine::start`] once, and [`TradingEngine::stop`]
/// on the way out (dropping the last handle stops it too).
pub struct TradingEngine {
    settings: EngineSettings,
    table: Arc<OrderTable>,
    stats: Arc<Mutex<EngineStats>>,
    limiter: Arc<RateLimiter>,
    events_tx: Sender<OrderEvent>,
    request_tx: Sender<EngineRequest>,
    request_rx: Mutex<Option<Receiver<EngineRequest>>>,
    boot: Mutex<Option<Boot>>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl TradingEngine {
    /// Creates a stopped engine.
    ///
    /// The adapter delivers its events into the sending half of
    /// `(events_tx, events_rx)`; the engine keeps a sender clone so it can
    /// inject synthetic rejects into the same stream.
    pub fn new(
        settings: EngineSettings,
        adapter: Box<dyn ExchangeAdapter>,
        events_tx: Sender<OrderEvent>,
        events_rx: Receiver<OrderEvent>,
        wiring: EngineWiring,
    ) -> Self {
        let (request_tx, request_rx) = bounded(settings.queue_capacity);
        let limiter = Arc::new(RateLimiter::per_second(settings.max_orders_per_sec));
        Self {
            settings,
            table: Arc::new(OrderTable::new()),
            stats: Arc::new(Mutex::new(EngineStats::default())),
            limiter,
            events_tx,
            request_tx,
            request_rx: Mutex::new(Some(request_rx)),
            boot: Mutex::new(Some(Boot {
                adapter,
                events_rx,
                wiring,
            })),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Connects the adapter and spawns the engine threads.
    pub fn start(self: &Arc<Self>) -> Result<(), Error> {
        let boot = lock(&self.boot).take().ok_or_else(|| {
            Error::State("engine already started".to_string())
        })?;
        let Boot {
            mut adapter,
            events_rx,
            wiring,
        } = boot;
        adapter.connect().map_err(|e| {
            Error::Connection(format!("{} adapter: {}", self.settings.exchange, e))
        })?;

        let request_rx = lock(&self.request_rx)
            .take()
            .ok_or_else(|| Error::State("engine request queue already consumed".to_string()))?;

        self.running.store(true, Ordering::SeqCst);
        let poll = Duration::from_millis(self.settings.poll_interval_ms);
        let mut threads = lock(&self.threads);

        {
            let table = Arc::clone(&self.table);
            let events_tx = self.events_tx.clone();
            let stats = Arc::clone(&self.stats);
            let running = Arc::clone(&self.running);
            threads.push(thread::spawn(move || {
                run_worker(adapter, request_rx, table, events_tx, stats, running, poll)
            }));
        }

        {
            let EngineWiring {
                orders_sub,
                events_pub,
                event_topic,
                event_tap,
            } = wiring;
            let weak = Arc::downgrade(self);
            let running = Arc::clone(&self.running);
            threads.push(thread::spawn(move || {
                run_event_loop(weak, events_rx, events_pub, event_topic, event_tap, running, poll)
            }));

            if let Some(orders_sub) = orders_sub {
                let weak = Arc::downgrade(self);
                let running = Arc::clone(&self.running);
                threads.push(thread::spawn(move || {
                    run_bus_listener(weak, orders_sub, running, poll)
                }));
            }
        }

        info!(
            "engine for {} started ({} threads)",
            self.settings.exchange,
            threads.len()
        );
        Ok(())
    }

    /// Stops every engine thread and disconnects the adapter. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let threads = std::mem::take(&mut *lock(&self.threads));
        if threads.is_empty() {
            return;
        }
        for handle in threads {
            if handle.join().is_err() {
                warn!("engine thread panicked during shutdown");
            }
        }
        info!("engine for {} stopped", self.settings.exchange);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn exchange(&self) -> &str {
        &self.settings.exchange
    }

    /// Accepts a new order into the lifecycle.
    ///
    /// `Ok` means the order is now tracked and will progress through events,
    /// which may still include an immediate synthetic reject (rate limit,
    /// full queue, adapter failure). `Err` means the order never entered the
    /// lifecycle and no entry was created.
    pub fn submit(&self, order: Order) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::State("engine is not running".to_string()));
        }
        validate(&order)?;
        lock(&self.stats).received += 1;
        self.table.insert(order.clone())?;

        if !self.limiter.try_acquire() {
            self.synthetic_reject(&order, RATE_LIMIT_REJECT_TEXT);
            return Ok(());
        }
        match self.request_tx.try_send(EngineRequest::Submit(order)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(EngineRequest::Submit(order))) => {
                self.synthetic_reject(&order, QUEUE_FULL_REJECT_TEXT);
                Ok(())
            }
            Err(_) => Err(Error::State("engine worker is gone".to_string())),
        }
    }

    /// Requests a cancel for a tracked, still-open order.
    pub fn cancel(&self, cl_ord_id: &str) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::State("engine is not running".to_string()));
        }
        let tracked = self
            .table
            .get(cl_ord_id)
            .ok_or_else(|| Error::State(format!("unknown order {}", cl_ord_id)))?;
        if tracked.state.is_terminal() {
            return Err(Error::State(format!(
                "order {} is already {}",
                cl_ord_id, tracked.state
            )));
        }
        match self.request_tx.try_send(EngineRequest::Cancel {
            cl_ord_id: cl_ord_id.to_string(),
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::RateLimit(
                "engine queue full, cancel not enqueued".to_string(),
            )),
            Err(_) => Err(Error::State("engine worker is gone".to_string())),
        }
    }

    /// Cancels `cl_ord_id` and submits a copy under `new_cl_ord_id` with a
    /// new price and quantity. Two independent round trips; the cancel can
    /// succeed while the new order is rejected.
    pub fn replace(
        &self,
        cl_ord_id: &str,
        new_cl_ord_id: impl Into<String>,
        new_price: f64,
        new_qty: f64,
    ) -> Result<(), Error> {
        let existing = self
            .table
            .get(cl_ord_id)
            .ok_or_else(|| Error::State(format!("unknown order {}", cl_ord_id)))?;
        if existing.state.is_terminal() {
            return Err(Error::State(format!(
                "order {} is already {}",
                cl_ord_id, existing.state
            )));
        }
        self.cancel(cl_ord_id)?;
        self.submit(Order {
            cl_ord_id: new_cl_ord_id.into(),
            exch: existing.order.exch,
            symbol: existing.order.symbol,
            side: existing.order.side,
            order_type: existing.order.order_type,
            qty: new_qty,
            price: new_price,
            created_us: Utc::now().timestamp_micros(),
        })
    }

    pub fn order(&self, cl_ord_id: &str) -> Option<TrackedOrder> {
        self.table.get(cl_ord_id)
    }

    pub fn open_orders(&self) -> Vec<TrackedOrder> {
        self.table.open_orders()
    }

    pub fn stats(&self) -> EngineStats {
        *lock(&self.stats)
    }

    pub fn table(&self) -> Arc<OrderTable> {
        Arc::clone(&self.table)
    }

    /// Evicts terminal orders older than `max_age`; see
    /// [`OrderTable::purge_terminal`].
    pub fn purge_terminal(&self, max_age: Duration) -> usize {
        self.table.purge_terminal(max_age)
    }

    fn synthetic_reject(&self, order: &Order, reason: &str) {
        let event = OrderEvent::reject(
            order.cl_ord_id.as_str(),
            self.settings.exchange.as_str(),
            order.symbol.as_str(),
            codec::clip_str(reason, TEXT_CAP),
            Utc::now().timestamp_micros(),
        );
        if self.events_tx.send(event).is_err() {
            warn!("event channel closed, reject for {} lost", order.cl_ord_id);
        }
    }

}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Validation applied before an order enters the lifecycle. Width caps match
/// the wire slots so nothing accepted here can fail to encode later.
fn validate(order: &Order) -> Result<(), Error> {
    if order.cl_ord_id.is_empty() {
        return Err(Error::Validation("cl_ord_id must not be empty".to_string()));
    }
    if order.cl_ord_id.len() > CL_ORD_ID_CAP {
        return Err(Error::Validation(format!(
            "cl_ord_id {} exceeds {} bytes",
            order.cl_ord_id, CL_ORD_ID_CAP
        )));
    }
    if order.exch.len() > EXCH_CAP {
        return Err(Error::Validation(format!(
            "exch {} exceeds {} bytes",
            order.exch, EXCH_CAP
        )));
    }
    if order.symbol.is_empty() {
        return Err(Error::Validation("symbol must not be empty".to_string()));
    }
    if order.symbol.len() > SYMBOL_CAP {
        return Err(Error::Validation(format!(
            "symbol {} exceeds {} bytes",
            order.symbol, SYMBOL_CAP
        )));
    }
    if !order.qty.is_finite() || order.qty <= 0.0 {
        return Err(Error::Validation(format!(
            "qty {} must be positive",
            order.qty
        )));
    }
    if order.order_type == OrderType::Limit && (!order.price.is_finite() || order.price <= 0.0) {
        return Err(Error::Validation(format!(
            "limit price {} must be positive",
            order.price
        )));
    }
    Ok(())
}

fn run_worker(
    mut adapter: Box<dyn ExchangeAdapter>,
    requests: Receiver<EngineRequest>,
    table: Arc<OrderTable>,
    events_tx: Sender<OrderEvent>,
    stats: Arc<Mutex<EngineStats>>,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    info!("order worker started for {}", adapter.exchange());
    while running.load(Ordering::SeqCst) {
        match requests.recv_timeout(poll) {
            Ok(request) => handle_request(&mut adapter, request, &table, &events_tx, &stats),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Requests accepted before the stop still reach the adapter.
    while let Ok(request) = requests.try_recv() {
        handle_request(&mut adapter, request, &table, &events_tx, &stats);
    }
    adapter.disconnect();
    info!("order worker stopped");
}

fn handle_request(
    adapter: &mut Box<dyn ExchangeAdapter>,
    request: EngineRequest,
    table: &OrderTable,
    events_tx: &Sender<OrderEvent>,
    stats: &Mutex<EngineStats>,
) {
    match request {
        EngineRequest::Submit(order) => match adapter.send_order(&order) {
            Ok(response) => {
                lock(stats).submitted += 1;
                debug!(
                    "order {} handed to {} ({})",
                    order.cl_ord_id,
                    adapter.exchange(),
                    response.status
                );
            }
            Err(e) => {
                warn!("send_order for {} failed: {}", order.cl_ord_id, e);
                let reason = format!("{}: {}", e.kind, e.message);
                let event = OrderEvent::reject(
                    order.cl_ord_id.as_str(),
                    order.exch.as_str(),
                    order.symbol.as_str(),
                    codec::clip_str(&reason, TEXT_CAP),
                    Utc::now().timestamp_micros(),
                );
                if events_tx.send(event).is_err() {
                    warn!("event channel closed, reject for {} lost", order.cl_ord_id);
                }
            }
        },
        EngineRequest::Cancel { cl_ord_id } => {
            let exchange_order_id = table
                .get(&cl_ord_id)
                .map(|tracked| tracked.exchange_order_id)
                .unwrap_or_default();
            match adapter.cancel_order(&cl_ord_id, &exchange_order_id) {
                Ok(true) => debug!("cancel for {} accepted", cl_ord_id),
                Ok(false) => warn!("cancel for {} not accepted", cl_ord_id),
                Err(e) => warn!("cancel for {} failed: {}", cl_ord_id, e),
            }
        }
    }
}

fn run_event_loop(
    engine: Weak<TradingEngine>,
    events_rx: Receiver<OrderEvent>,
    events_pub: Option<Box<dyn BusPublisher>>,
    event_topic: String,
    event_tap: Option<Sender<OrderEvent>>,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    info!("event loop started");
    let mut sequence: u32 = 0;
    while running.load(Ordering::SeqCst) {
        let event = match events_rx.recv_timeout(poll) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let engine = match engine.upgrade() {
            Some(engine) => engine,
            None => break,
        };
        match engine.table.apply(&event) {
            ApplyOutcome::Applied { from, to } => {
                info!(
                    "order {} {}: {} -> {}",
                    event.cl_ord_id, event.event_type, from, to
                );
                let mut stats = lock(&engine.stats);
                match to {
                    OrderState::Filled => stats.filled += 1,
                    OrderState::Cancelled => stats.cancelled += 1,
                    OrderState::Rejected => stats.rejected += 1,
                    _ => {}
                }
            }
            ApplyOutcome::UnknownOrder => {
                // Not ours; apply() already logged it. Never republished.
                continue;
            }
            ApplyOutcome::TerminalNoOp { .. } => {}
        }

        if let Some(events_pub) = &events_pub {
            sequence = sequence.wrapping_add(1);
            match codec::encode_order_event(&event, sequence) {
                Ok(frame) => {
                    if let Err(e) = events_pub.publish(&event_topic, &frame) {
                        warn!("event publish failed: {}", e);
                    } else {
                        lock(&engine.stats).events_published += 1;
                    }
                }
                Err(e) => warn!("event for {} not publishable: {}", event.cl_ord_id, e),
            }
        }
        if let Some(event_tap) = &event_tap {
            if event_tap.send(event).is_err() {
                debug!("event tap closed");
            }
        }
    }
    info!("event loop stopped");
}

fn run_bus_listener(
    engine: Weak<TradingEngine>,
    orders_sub: Box<dyn BusSubscriber>,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    info!("order listener started on topic {}", orders_sub.topic());
    let poll_ms = poll.as_millis() as i64;
    while running.load(Ordering::SeqCst) {
        let engine = match engine.upgrade() {
            Some(engine) => engine,
            None => break,
        };
        match orders_sub.receive_timeout(poll_ms) {
            Ok(Some(frame)) => dispatch_frame(&engine, &frame),
            Ok(None) => {}
            Err(e) => {
                warn!("order listener receive error: {}", e);
                thread::sleep(poll);
            }
        }
    }
    info!("order listener stopped");
}

/// Order and cancel requests share the order topic and are told apart by
/// frame size.
fn dispatch_frame(engine: &TradingEngine, frame: &[u8]) {
    match frame.len() {
        ORDER_SIZE => match codec::decode_order(frame) {
            Ok(order) => {
                let cl_ord_id = order.cl_ord_id.clone();
                if let Err(e) = engine.submit(order) {
                    warn!("bus order {} refused: {}", cl_ord_id, e);
                }
            }
            Err(e) => warn!("undecodable order frame: {}", e),
        },
        ORDER_EVENT_SIZE => match codec::decode_order_event(frame) {
            Ok(request) if request.event_type == OrderEventType::Cancel => {
                if let Err(e) = engine.cancel(&request.cl_ord_id) {
                    warn!("bus cancel for {} refused: {}", request.cl_ord_id, e);
                }
            }
            Ok(request) => warn!(
                "unexpected {} frame on the order topic",
                request.event_type
            ),
            Err(e) => warn!("undecodable cancel frame: {}", e),
        },
        other => warn!("dropping {} byte frame on the order topic", other),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
