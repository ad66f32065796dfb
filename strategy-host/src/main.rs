use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use log::info;
use strategy_host::config::StrategyHostConfig;
use strategy_host::container::{ContainerFeeds, StrategyContainer};
use strategy_host::strategies::MarketMaker;
use tickbus_core::args::ProcessArgs;
use tickbus_core::comms::TypedSubscriber;
use tickbus_core::oms::{BusAdapter, BusAdapterConfig, EngineSettings, EngineWiring, TradingEngine};
use tickbus_core::{comms, config, signal};

fn main() -> Result<()> {
    env_logger::init();
    signal::install();

    let args = ProcessArgs::parse_args();
    let cfg: StrategyHostConfig = config::load(args.config_path())?;
    info!(
        "strategy host starting on {} ({})",
        cfg.exchange, cfg.strategy.symbol
    );

    let (events_tx, events_rx) = unbounded();
    let adapter_config = BusAdapterConfig::new(cfg.exchange.as_str(), &cfg.bus)
        .with_requests_per_min(cfg.requests_per_min);
    let adapter = BusAdapter::new(adapter_config, events_tx.clone());

    let (tap_tx, tap_rx) = unbounded();
    let wiring = EngineWiring {
        orders_sub: None,
        events_pub: None,
        event_topic: cfg.bus.order_events.topic.clone(),
        event_tap: Some(tap_tx),
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

    let md_topic = config::md_topic(&cfg.exchange, &cfg.strategy.symbol);
    let book_sub = comms::connect_subscriber(&cfg.bus.market_data.sub_endpoint, &md_topic)
        .context("subscribing to market data")?;
    let pos_topic = config::pos_topic(&cfg.exchange, &cfg.strategy.symbol);
    let position_sub = TypedSubscriber::new(
        comms::connect_subscriber(&cfg.bus.positions.sub_endpoint, &pos_topic)
            .context("subscribing to positions")?,
    );
    info!("market data on {}, positions on {}", md_topic, pos_topic);

    let strategy = MarketMaker::new(cfg.exchange.as_str(), cfg.strategy.clone());
    let container = StrategyContainer::new(Arc::clone(&engine), Box::new(strategy));
    container.start(ContainerFeeds {
        book_sub,
        position_sub,
        event_tap: tap_rx,
    })?;
    info!("container up");

    let stats_every = Duration::from_secs(cfg.stats_interval_secs);
    let mut last_stats = Instant::now();
    while !signal::shutdown_requested() {
        thread::sleep(Duration::from_millis(200));
        if last_stats.elapsed() >= stats_every {
            info!(
                "stats {} open_orders={} actions={}",
                engine.stats(),
                engine.open_orders().len(),
                container.actions_executed()
            );
            last_stats = Instant::now();
        }
    }

    info!("shutdown requested");
    container.stop();
    Ok(())
}
