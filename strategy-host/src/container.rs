//! The container around one strategy.
//!
//! Three subscriber threads feed the strategy: book snapshots, position and
//! balance updates, and order events from the engine's tap. Callbacks are
//! serialized behind one mutex, so strategies stay lock-free inside. Returned
//! actions are executed against the engine on the calling thread, which keeps
//! the order of a callback's actions intact.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};
use tickbus::{Error, OrderAction, OrderEvent, PositionUpdate, Strategy};
use tickbus_core::codec;
use tickbus_core::comms::{BusSubscriber, TypedSubscriber};
use tickbus_core::oms::TradingEngine;

use crate::cache::PositionCache;

const POLL_MS: i64 = 100;

/// Inbound feeds the container drains.
pub struct ContainerFeeds {
    /// Book snapshots for the traded instrument.
    pub book_sub: Box<dyn BusSubscriber>,
    /// Position and balance updates.
    pub position_sub: TypedSubscriber<PositionUpdate>,
    /// The engine's event tap.
    pub event_tap: Receiver<OrderEvent>,
}

/// Owns the engine, the cache, and exactly one strategy.
pub struct StrategyContainer {
    engine: Arc<TradingEngine>,
    cache: Arc<PositionCache>,
    strategy: Arc<Mutex<Box<dyn Strategy>>>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    actions_executed: Arc<AtomicU64>,
}

impl StrategyContainer {
    pub fn new(engine: Arc<TradingEngine>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            engine,
            cache: Arc::new(PositionCache::new()),
            strategy: Arc::new(Mutex::new(strategy)),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            actions_executed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts the engine and the three subscriber threads.
    pub fn start(&self, feeds: ContainerFeeds) -> Result<(), Error> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::State("container already started".to_string()));
        }
        self.engine.start()?;
        info!("container up, strategy {}", lock(&self.strategy).name());

        let mut threads = lock(&self.threads);
        threads.push(self.spawn_book_thread(feeds.book_sub));
        threads.push(self.spawn_position_thread(feeds.position_sub));
        threads.push(self.spawn_event_thread(feeds.event_tap));
        Ok(())
    }

    /// Asks the strategy for its final actions, executes them, then tears
    /// everything down. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let finals = lock(&self.strategy).on_stop();
        if !finals.is_empty() {
            info!("executing {} shutdown actions", finals.len());
            execute_actions(&self.engine, finals, &self.actions_executed);
        }
        let mut threads = lock(&self.threads);
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                warn!("container thread panicked");
            }
        }
        self.engine.stop();
        info!("container stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &Arc<TradingEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<PositionCache> {
        &self.cache
    }

    /// Actions the engine accepted so far.
    pub fn actions_executed(&self) -> u64 {
        self.actions_executed.load(Ordering::Relaxed)
    }

    fn spawn_book_thread(&self, book_sub: Box<dyn BusSubscriber>) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let strategy = Arc::clone(&self.strategy);
        let engine = Arc::clone(&self.engine);
        let executed = Arc::clone(&self.actions_executed);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match book_sub.receive_timeout(POLL_MS) {
                    Ok(Some(frame)) => match codec::decode_book(&frame) {
                        Ok(book) => {
                            let actions = lock(&strategy).on_book(&book);
                            execute_actions(&engine, actions, &executed);
                        }
                        Err(e) => warn!("dropping undecodable book frame: {}", e),
                    },
                    Ok(None) => {}
                    Err(e) => warn!("book subscription error: {}", e),
                }
            }
        })
    }

    fn spawn_position_thread(
        &self,
        position_sub: TypedSubscriber<PositionUpdate>,
    ) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let strategy = Arc::clone(&self.strategy);
        let engine = Arc::clone(&self.engine);
        let executed = Arc::clone(&self.actions_executed);
        let cache = Arc::clone(&self.cache);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match position_sub.receive_timeout(POLL_MS) {
                    Ok(Some(update)) => {
                        // Cache first so the strategy reads a current view.
                        cache.apply(update.clone());
                        let actions = match &update {
                            PositionUpdate::Position(position) => {
                                lock(&strategy).on_position(position)
                            }
                            PositionUpdate::Balance(balance) => {
                                lock(&strategy).on_balance(balance)
                            }
                        };
                        execute_actions(&engine, actions, &executed);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("position subscription error: {}", e),
                }
            }
        })
    }

    fn spawn_event_thread(&self, event_tap: Receiver<OrderEvent>) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let strategy = Arc::clone(&self.strategy);
        let engine = Arc::clone(&self.engine);
        let executed = Arc::clone(&self.actions_executed);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match event_tap.recv_timeout(Duration::from_millis(POLL_MS as u64)) {
                    Ok(event) => {
                        let actions = lock(&strategy).on_order_event(&event);
                        execute_actions(&engine, actions, &executed);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }
}

impl Drop for StrategyContainer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute_actions(engine: &TradingEngine, actions: Vec<OrderAction>, executed: &AtomicU64) {
    for action in actions {
        match action {
            OrderAction::Place(order) => {
                let cl_ord_id = order.cl_ord_id.clone();
                match engine.submit(order) {
                    Ok(()) => {
                        executed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => warn!("place of {} refused: {}", cl_ord_id, e),
                }
            }
            OrderAction::Cancel { cl_ord_id } => match engine.cancel(&cl_ord_id) {
                Ok(()) => {
                    executed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("cancel of {} refused: {}", cl_ord_id, e),
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crossbeam_channel::unbounded;
    use tickbus::{BookLevel, Order, OrderBookSnapshot, PositionInfo, Side};
    use tickbus_core::comms::{BusPublisher, MemoryBus, TypedPublisher};
    use tickbus_core::config::BusConfig;
    use tickbus_core::oms::{
        BusAdapter, BusAdapterConfig, EngineSettings, EngineWiring, OrderState,
    };

    /// Counts callbacks and echoes scripted actions.
    struct Probe {
        books_seen: Arc<AtomicU64>,
        positions_seen: Arc<AtomicU64>,
        events_seen: Arc<AtomicU64>,
        place_on_first_book: Option<Order>,
    }

    impl Strategy for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn on_book(&mut self, _book: &OrderBookSnapshot) -> Vec<OrderAction> {
            self.books_seen.fetch_add(1, Ordering::Relaxed);
            match self.place_on_first_book.take() {
                Some(order) => vec![OrderAction::Place(order)],
                None => Vec::new(),
            }
        }

        fn on_order_event(&mut self, _event: &OrderEvent) -> Vec<OrderAction> {
            self.events_seen.fetch_add(1, Ordering::Relaxed);
            Vec::new()
        }

        fn on_position(&mut self, _position: &PositionInfo) -> Vec<OrderAction> {
            self.positions_seen.fetch_add(1, Ordering::Relaxed);
            Vec::new()
        }
    }

    struct Rig {
        container: StrategyContainer,
        bus: MemoryBus,
        books_seen: Arc<AtomicU64>,
        positions_seen: Arc<AtomicU64>,
        events_seen: Arc<AtomicU64>,
    }

    fn rig(place_on_first_book: Option<Order>) -> Rig {
        let bus = MemoryBus::new();
        let (events_tx, events_rx) = unbounded();
        let config = BusAdapterConfig::new("SIM", &BusConfig::default_local());
        let mut adapter = BusAdapter::new(config, events_tx.clone());
        adapter
            .connect_with(
                Box::new(bus.publisher()),
                Box::new(bus.subscriber("ord.ev")),
            )
            .unwrap();

        let (tap_tx, tap_rx) = unbounded();
        let wiring = EngineWiring {
            orders_sub: None,
            events_pub: None,
            event_topic: "ord.ev".to_string(),
            event_tap: Some(tap_tx),
        };
        let settings = EngineSettings::new("SIM").with_poll_interval_ms(10);
        let engine = Arc::new(TradingEngine::new(
            settings,
            Box::new(adapter),
            events_tx,
            events_rx,
            wiring,
        ));

        let books_seen = Arc::new(AtomicU64::new(0));
        let positions_seen = Arc::new(AtomicU64::new(0));
        let events_seen = Arc::new(AtomicU64::new(0));
        let probe = Probe {
            books_seen: Arc::clone(&books_seen),
            positions_seen: Arc::clone(&positions_seen),
            events_seen: Arc::clone(&events_seen),
            place_on_first_book,
        };
        let container = StrategyContainer::new(engine, Box::new(probe));
        let feeds = ContainerFeeds {
            book_sub: Box::new(bus.subscriber("md.")),
            position_sub: TypedSubscriber::new(Box::new(bus.subscriber("pos."))),
            event_tap: tap_rx,
        };
        container.start(feeds).unwrap();
        Rig {
            container,
            bus,
            books_seen,
            positions_seen,
            events_seen,
        }
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn sample_book() -> OrderBookSnapshot {
        let mut book = OrderBookSnapshot::new("BTCUSDT", 1, 1_700_000_000_000_000);
        book.bids.push(BookLevel::new(49999.0, 1.0));
        book.asks.push(BookLevel::new(50001.0, 1.0));
        book
    }

    #[test]
    fn book_frames_reach_the_strategy() {
        let rig = rig(None);
        let frame = codec::encode_book(&sample_book()).unwrap();
        rig.bus.publisher().publish("md.SIM.BTCUSDT", &frame).unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            rig.books_seen.load(Ordering::Relaxed) == 1
        }));
        rig.container.stop();
    }

    #[test]
    fn undecodable_book_frames_are_dropped_not_fatal() {
        let rig = rig(None);
        rig.bus.publisher().publish("md.SIM.BTCUSDT", &[1, 2, 3]).unwrap();
        let frame = codec::encode_book(&sample_book()).unwrap();
        rig.bus.publisher().publish("md.SIM.BTCUSDT", &frame).unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            rig.books_seen.load(Ordering::Relaxed) == 1
        }));
        rig.container.stop();
    }

    #[test]
    fn position_updates_land_in_cache_and_strategy() {
        let rig = rig(None);
        let update = PositionUpdate::Position(PositionInfo {
            exchange: "SIM".to_string(),
            symbol: "BTCUSDT".to_string(),
            qty: 0.3,
            avg_price: 50100.0,
            unrealized_pnl: 0.0,
            timestamp_us: 1_700_000_000_000_000,
        });
        let publisher: TypedPublisher<PositionUpdate> =
            TypedPublisher::new(Box::new(rig.bus.publisher()), "pos.SIM.BTCUSDT");
        publisher.publish(&update).unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            rig.positions_seen.load(Ordering::Relaxed) == 1
        }));
        assert_eq!(rig.container.cache().net_qty("SIM", "BTCUSDT"), 0.3);
        rig.container.stop();
    }

    #[test]
    fn strategy_actions_flow_to_the_order_topic_and_events_flow_back() {
        let order = Order::limit(
            "P1",
            "SIM",
            "BTCUSDT",
            Side::Buy,
            0.01,
            49975.0,
            1_700_000_000_000_000,
        );
        let rig = rig(Some(order));
        let wire = rig.bus.subscriber("ord.new");

        let frame = codec::encode_book(&sample_book()).unwrap();
        rig.bus.publisher().publish("md.SIM.BTCUSDT", &frame).unwrap();

        // The placed order appears on the bus.
        assert!(wait_until(Duration::from_secs(2), || {
            matches!(wire.try_receive(), Ok(Some(_)))
        }));
        assert_eq!(rig.container.actions_executed(), 1);

        // A remote ack comes back through the adapter pump and the tap.
        let ack = OrderEvent::ack("P1", "", "SIM", "BTCUSDT", 7);
        let ack_frame = codec::encode_order_event(&ack, 1).unwrap();
        rig.bus.publisher().publish("ord.ev", &ack_frame).unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            rig.events_seen.load(Ordering::Relaxed) == 1
        }));
        let tracked = rig.container.engine().order("P1").unwrap();
        assert_eq!(tracked.state, OrderState::Acknowledged);
        rig.container.stop();
    }

    #[test]
    fn stop_is_idempotent_and_stops_the_engine() {
        let rig = rig(None);
        assert!(rig.container.is_running());
        rig.container.stop();
        assert!(!rig.container.is_running());
        assert!(!rig.container.engine().is_running());
        rig.container.stop();
    }
}
