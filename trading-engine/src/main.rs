use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use log::info;
use tickbus_core::args::ProcessArgs;
use tickbus_core::comms::{self, BusPublisher};
use tickbus_core::oms::{EngineSettings, EngineWiring, TradingEngine};
use tickbus_core::{config, signal};
use trading_engine::adapter::SimAdapter;
use trading_engine::config::EngineConfig;

fn main() -> Result<()> {
    env_logger::init();
    signal::install();

    let args = ProcessArgs::parse_args();
    let cfg: EngineConfig = config::load(args.config_path())?;
    info!("engine starting for exchange {}", cfg.exchange);

    let (events_tx, events_rx) = unbounded();
    let adapter = SimAdapter::new(cfg.exchange.as_str(), cfg.adapter.clone(), events_tx.clone());

    let orders_sub = comms::connect_subscriber(&cfg.bus.orders.sub_endpoint, &cfg.bus.orders.topic)
        .context("subscribing to the order channel")?;
    let events_pub = comms::bind_publisher(&cfg.bus.order_events.pub_endpoint)
        .context("binding the order-event channel")?;
    info!(
        "orders from {} ({}), events on {}",
        cfg.bus.orders.sub_endpoint,
        cfg.bus.orders.topic,
        events_pub.endpoint()
    );

    let wiring = EngineWiring {
        orders_sub: Some(orders_sub),
        events_pub: Some(events_pub),
        event_topic: cfg.bus.order_events.topic.clone(),
        event_tap: None,
    };
    let settings = EngineSettings::new(cfg.exchange.as_str())
        .with_queue_capacity(cfg.queue_capacity)
        .with_max_orders_per_sec(cfg.max_orders_per_sec);

    let engine = Arc::new(TradingEngine::new(
        settings,
        Box::new(adapter),
        events_tx,
        events_rx,
        wiring,
    ));
    engine.start()?;
    info!("engine up");

    let stats_every = Duration::from_secs(cfg.stats_interval_secs);
    let purge_after = Duration::from_secs(cfg.purge_after_secs);
    let mut last_stats = Instant::now();
    while !signal::shutdown_requested() {
        thread::sleep(Duration::from_millis(200));
        if last_stats.elapsed() >= stats_every {
            info!("stats {}", engine.stats());
            let purged = engine.purge_terminal(purge_after);
            if purged > 0 {
                info!("purged {} closed orders", purged);
            }
            last_stats = Instant::now();
        }
    }

    info!("shutdown requested");
    engine.stop();
    info!("stats {}", engine.stats());
    Ok(())
}
