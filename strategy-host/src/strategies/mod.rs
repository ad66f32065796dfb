//! Strategy implementations hosted by the container.

pub mod market_maker;

pub use self::market_maker::{MarketMaker, MarketMakerConfig};
