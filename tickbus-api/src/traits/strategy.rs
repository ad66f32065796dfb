use crate::model::execution::OrderEvent;
use crate::model::market_data::OrderBookSnapshot;
use crate::model::order::Order;
use crate::model::position::{AccountBalanceInfo, PositionInfo};

/// What a strategy wants done in response to an update.
///
/// Strategies never touch the engine directly; they return actions and the
/// container executes them.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAction {
    /// Submit a new order.
    Place(Order),
    /// Cancel a previously placed order by client id.
    Cancel { cl_ord_id: String },
}

/// A trading strategy. Exactly one instance runs per strategy-host process.
///
/// Callbacks are invoked from the container's subscriber threads, one at a
/// time (the container serializes them), so implementations need no internal
/// locking.
pub trait Strategy: Send {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Called for every order-book snapshot on the subscribed topic.
    fn on_book(&mut self, book: &OrderBookSnapshot) -> Vec<OrderAction>;

    /// Called for every order lifecycle event observed by the local engine.
    fn on_order_event(&mut self, event: &OrderEvent) -> Vec<OrderAction>;

    /// Called for every position snapshot.
    fn on_position(&mut self, position: &PositionInfo) -> Vec<OrderAction>;

    /// Called for every balance snapshot. Optional.
    fn on_balance(&mut self, _balance: &AccountBalanceInfo) -> Vec<OrderAction> {
        Vec::new()
    }

    /// Called once at shutdown, before the container stops; the returned
    /// actions (typically quote withdrawal) are executed synchronously.
    fn on_stop(&mut self) -> Vec<OrderAction> {
        Vec::new()
    }
}

impl Strategy for Box<dyn Strategy> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_book(&mut self, book: &OrderBookSnapshot) -> Vec<OrderAction> {
        (**self).on_book(book)
    }

    fn on_order_event(&mut self, event: &OrderEvent) -> Vec<OrderAction> {
        (**self).on_order_event(event)
    }

    fn on_position(&mut self, position: &PositionInfo) -> Vec<OrderAction> {
        (**self).on_position(position)
    }

    fn on_balance(&mut self, balance: &AccountBalanceInfo) -> Vec<OrderAction> {
        (**self).on_balance(balance)
    }

    fn on_stop(&mut self) -> Vec<OrderAction> {
        (**self).on_stop()
    }
}
