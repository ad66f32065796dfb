//! Order management core shared by the engine service and the strategy
//! container.
//!
//! ## Modules
//! - `state`: Order lifecycle states and transition rules.
//! - `table`: The thread-safe order table.
//! - `rate_limit`: Fixed-window limiter for outbound flow.
//! - `engine`: The reusable trading engine (adapter worker + event loop).
//! - `bus`: An adapter that forwards orders over the bus to a remote engine.

pub mod bus;
pub mod engine;
pub mod rate_limit;
pub mod state;
pub mod table;

pub use self::bus::{BusAdapter, BusAdapterConfig};
pub use self::engine::{EngineSettings, EngineStats, EngineWiring, TradingEngine};
pub use self::rate_limit::RateLimiter;
pub use self::state::{next_state, OrderState};
pub use self::table::{ApplyOutcome, OrderTable, TrackedOrder};
