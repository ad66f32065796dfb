//! The shared order table: every in-flight and recently closed order, keyed
//! by client order id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tickbus::{Error, Order, OrderEvent, OrderEventType};

use crate::oms::state::{next_state, OrderState};

/// One order and everything learned about it so far.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedOrder {
    pub order: Order,
    pub state: OrderState,
    /// Cumulative quantity filled across all executions.
    pub filled_qty: f64,
    /// Volume-weighted average price of those executions.
    pub avg_fill_price: f64,
    /// Exchange-assigned id, empty until the first event that carries one.
    pub exchange_order_id: String,
    /// Reason text of the reject that closed the order, if any.
    pub reject_reason: String,
    pub last_update_us: i64,
}

impl TrackedOrder {
    fn new(order: Order) -> Self {
        let last_update_us = order.created_us;
        Self {
            order,
            state: OrderState::Pending,
            filled_qty: 0.0,
            avg_fill_price: 0.0,
            exchange_order_id: String::new(),
            reject_reason: String::new(),
            last_update_us,
        }
    }

    pub fn remaining_qty(&self) -> f64 {
        (self.order.qty - self.filled_qty).max(0.0)
    }

    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }
}

/// What applying an event to the table did.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The order moved (or re-confirmed) its state.
    Applied { from: OrderState, to: OrderState },
    /// No order with that client id is tracked here; nothing was created.
    UnknownOrder,
    /// The order was already terminal; the event changed nothing.
    TerminalNoOp { state: OrderState },
}

/// Thread-safe order table. [`OrderTable::apply`] is the only path that
/// mutates a tracked order after insertion.
#[derive(Default)]
pub struct OrderTable {
    orders: Mutex<HashMap<String, TrackedOrder>>,
}

impl OrderTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedOrder>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new order in `Pending` state.
    ///
    /// Client order ids are unique for the lifetime of the table; reusing one
    /// is an error even after the first order closed.
    pub fn insert(&self, order: Order) -> Result<(), Error> {
        let mut orders = self.lock();
        if orders.contains_key(&order.cl_ord_id) {
            return Err(Error::State(format!(
                "duplicate cl_ord_id {}",
                order.cl_ord_id
            )));
        }
        orders.insert(order.cl_ord_id.clone(), TrackedOrder::new(order));
        Ok(())
    }

    /// Applies one order event.
    ///
    /// Events for unknown ids are logged and dropped without creating an
    /// entry. Events for terminal orders are no-ops. Fill quantities
    /// accumulate; the exchange order id is recorded the first time any event
    /// carries one.
    pub fn apply(&self, event: &OrderEvent) -> ApplyOutcome {
        let now_us = Utc::now().timestamp_micros();
        let mut orders = self.lock();
        let entry = match orders.get_mut(&event.cl_ord_id) {
            Some(entry) => entry,
            None => {
                warn!(
                    "{} event for unknown order {} ignored",
                    event.event_type, event.cl_ord_id
                );
                return ApplyOutcome::UnknownOrder;
            }
        };
        if entry.state.is_terminal() {
            debug!(
                "{} event for terminal order {} ({}) ignored",
                event.event_type, event.cl_ord_id, entry.state
            );
            return ApplyOutcome::TerminalNoOp { state: entry.state };
        }

        if entry.exchange_order_id.is_empty() && !event.exchange_order_id.is_empty() {
            entry.exchange_order_id = event.exchange_order_id.clone();
        }
        if event.event_type == OrderEventType::Fill && event.fill_qty > 0.0 {
            let previous = entry.filled_qty;
            entry.filled_qty += event.fill_qty;
            entry.avg_fill_price = (entry.avg_fill_price * previous
                + event.fill_price * event.fill_qty)
                / entry.filled_qty;
        }
        if event.event_type == OrderEventType::Reject {
            entry.reject_reason = event.text.clone();
        }

        let from = entry.state;
        let to = match next_state(from, event.event_type, entry.filled_qty, entry.order.qty) {
            Some(to) => to,
            // Unreachable: terminal entries returned above.
            None => return ApplyOutcome::TerminalNoOp { state: from },
        };
        entry.state = to;
        entry.last_update_us = now_us;
        ApplyOutcome::Applied { from, to }
    }

    /// Returns a snapshot of one tracked order.
    pub fn get(&self, cl_ord_id: &str) -> Option<TrackedOrder> {
        self.lock().get(cl_ord_id).cloned()
    }

    pub fn contains(&self, cl_ord_id: &str) -> bool {
        self.lock().contains_key(cl_ord_id)
    }

    /// Snapshots every non-terminal order.
    pub fn open_orders(&self) -> Vec<TrackedOrder> {
        self.lock()
            .values()
            .filter(|entry| entry.is_open())
            .cloned()
            .collect()
    }

    /// Snapshots the whole table.
    pub fn all_orders(&self) -> Vec<TrackedOrder> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Evicts terminal orders whose last update is older than `max_age`.
    /// Returns how many entries were removed. Open orders are never evicted.
    pub fn purge_terminal(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now().timestamp_micros() - max_age.as_micros() as i64;
        let mut orders = self.lock();
        let before = orders.len();
        orders.retain(|_, entry| entry.is_open() || entry.last_update_us > cutoff);
        before - orders.len()
    }
}
