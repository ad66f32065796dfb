use std::collections::HashMap;

use crate::error::AdapterResult;
use crate::model::execution::{OrderResponse, Trade};
use crate::model::order::Order;
use crate::model::position::{AccountBalanceInfo, PositionInfo};

/// The polymorphic boundary between the engine and one exchange.
///
/// One adapter instance per exchange per engine; adapters are never shared
/// across engines. Operations look synchronous but may be backed by the
/// adapter's own worker threads. Inbound lifecycle notifications are pushed
/// into the event channel the concrete adapter received at construction, not
/// returned from these calls.
///
/// Adapters enforce their own request budget and fail fast with
/// `RateLimitExceeded` instead of queueing.
pub trait ExchangeAdapter: Send {
    /// Name of the exchange this adapter talks to.
    fn exchange(&self) -> &str;

    /// Establishes the connection.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` once the adapter is ready to accept orders.
    fn connect(&mut self) -> AdapterResult<bool>;

    /// Tears the connection down and stops any worker threads. Idempotent.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Hands an order to the exchange.
    ///
    /// # Returns
    ///
    /// * `OrderResponse` - transport-level feedback; the acknowledgement
    ///   itself arrives later as an OrderEvent on the adapter's channel.
    fn send_order(&mut self, order: &Order) -> AdapterResult<OrderResponse>;

    /// Cancels an order by client id (and exchange id where known).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the cancel was accepted for processing; the terminal
    ///   Cancel event arrives on the channel. `OrderNotFound` if the
    ///   exchange does not know the order.
    fn cancel_order(&mut self, cl_ord_id: &str, exchange_order_id: &str) -> AdapterResult<bool>;

    /// Replaces price/quantity in place where the exchange supports a native
    /// modify; adapters without one return `ApiError` and callers fall back
    /// to cancel-then-new.
    fn modify_order(
        &mut self,
        cl_ord_id: &str,
        exchange_order_id: &str,
        new_price: f64,
        new_qty: f64,
    ) -> AdapterResult<bool>;

    fn positions(&self) -> AdapterResult<Vec<PositionInfo>>;

    fn balances(&self) -> AdapterResult<Vec<AccountBalanceInfo>>;

    fn open_orders(&self) -> AdapterResult<Vec<Order>>;

    fn trade_history(&self) -> AdapterResult<Vec<Trade>>;

    /// Descriptive health snapshot (connected flag, counters) for operator
    /// logs. Keys are adapter-defined.
    fn health(&self) -> HashMap<String, String>;

    /// Numeric counters for the same purpose.
    fn metrics(&self) -> HashMap<String, f64>;
}

impl ExchangeAdapter for Box<dyn ExchangeAdapter> {
    fn exchange(&self) -> &str {
        (**self).exchange()
    }

    fn connect(&mut self) -> AdapterResult<bool> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_order(&mut self, order: &Order) -> AdapterResult<OrderResponse> {
        (**self).send_order(order)
    }

    fn cancel_order(&mut self, cl_ord_id: &str, exchange_order_id: &str) -> AdapterResult<bool> {
        (**self).cancel_order(cl_ord_id, exchange_order_id)
    }

    fn modify_order(
        &mut self,
        cl_ord_id: &str,
        exchange_order_id: &str,
        new_price: f64,
        new_qty: f64,
    ) -> AdapterResult<bool> {
        (**self).modify_order(cl_ord_id, exchange_order_id, new_price, new_qty)
    }

    fn positions(&self) -> AdapterResult<Vec<PositionInfo>> {
        (**self).positions()
    }

    fn balances(&self) -> AdapterResult<Vec<AccountBalanceInfo>> {
        (**self).balances()
    }

    fn open_orders(&self) -> AdapterResult<Vec<Order>> {
        (**self).open_orders()
    }

    fn trade_history(&self) -> AdapterResult<Vec<Trade>> {
        (**self).trade_history()
    }

    fn health(&self) -> HashMap<String, String> {
        (**self).health()
    }

    fn metrics(&self) -> HashMap<String, f64> {
        (**self).metrics()
    }
}
