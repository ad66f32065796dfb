use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use sim_feed::config::FeedConfig;
use sim_feed::sim::{BookSimulator, PositionSimulator};
use tickbus::PositionUpdate;
use tickbus_core::args::ProcessArgs;
use tickbus_core::codec;
use tickbus_core::comms::{self, BusPublisher, TypedPublisher};
use tickbus_core::{config, signal};

fn main() -> Result<()> {
    env_logger::init();
    signal::install();

    let args = ProcessArgs::parse_args();
    let cfg: FeedConfig = config::load(args.config_path())?;
    info!("feed starting for {} {}", cfg.exchange, cfg.symbol);

    let md_pub = comms::bind_publisher(&cfg.bus.market_data.pub_endpoint)
        .context("binding the market-data channel")?;
    let pos_pub: TypedPublisher<PositionUpdate> = TypedPublisher::new(
        comms::bind_publisher(&cfg.bus.positions.pub_endpoint)
            .context("binding the position channel")?,
        config::pos_topic(&cfg.exchange, &cfg.symbol),
    );
    let md_topic = config::md_topic(&cfg.exchange, &cfg.symbol);
    info!(
        "books on {} ({}), positions on {}",
        md_pub.endpoint(),
        md_topic,
        pos_pub.topic()
    );

    let mut books = BookSimulator::new(
        cfg.symbol.as_str(),
        cfg.tick_size,
        cfg.levels,
        cfg.start_price,
    );
    let mut positions = PositionSimulator::new(cfg.exchange.as_str(), cfg.symbol.as_str());

    let interval = Duration::from_millis(cfg.publish_interval_ms);
    let mut published: u64 = 0;
    while !signal::shutdown_requested() {
        let now = Utc::now().timestamp_micros();
        let book = books.next_book(now);
        let frame = codec::encode_book(&book).context("encoding a book snapshot")?;
        md_pub.publish(&md_topic, &frame)?;
        published += 1;
        if cfg.position_every > 0 && published % cfg.position_every == 0 {
            let position = positions.next_position(books.mid(), now);
            pos_pub.publish(&PositionUpdate::Position(position))?;
        }
        thread::sleep(interval);
    }

    info!("shutdown requested after {} snapshots", published);
    Ok(())
}
