pub mod error;
pub mod model;
pub mod traits;

pub use error::{AdapterError, AdapterErrorKind, AdapterResult, Error};
pub use model::execution::{OrderEvent, OrderEventType, OrderResponse, Trade};
pub use model::market_data::{BookLevel, OrderBookSnapshot};
pub use model::order::{Order, OrderType, Side};
pub use model::position::{AccountBalanceInfo, PositionInfo, PositionUpdate};
pub use traits::adapter::ExchangeAdapter;
pub use traits::strategy::{OrderAction, Strategy};

pub mod prelude {
    pub use crate::model::market_data::{BookLevel, OrderBookSnapshot};
    pub use crate::model::order::{Order, OrderType, Side};
    pub use crate::model::position::{AccountBalanceInfo, PositionInfo};
    pub use crate::traits::strategy::{OrderAction, Strategy};
}
