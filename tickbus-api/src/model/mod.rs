//! Core data models shared across the trading platform.
//!
//! These are the message shapes that cross process boundaries on the bus, so
//! every service (engine, strategy host, feeds) agrees on one definition.
//!
//! # Submodules
//! - [`order`]: order intents (side, type, quantity, price).
//! - [`execution`]: order lifecycle events, responses and trades.
//! - [`market_data`]: order-book snapshots.
//! - [`position`]: position and account-balance snapshots.

pub mod execution;
pub mod market_data;
pub mod order;
pub mod position;

pub use execution::{OrderEvent, OrderEventType, OrderResponse, Trade};
pub use market_data::{BookLevel, OrderBookSnapshot};
pub use order::{Order, OrderType, Side};
pub use position::{AccountBalanceInfo, PositionInfo, PositionUpdate};
