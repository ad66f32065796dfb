use serde::{Deserialize, Serialize};

use crate::model::order::Side;

/// Kind of order lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventType {
    /// Exchange accepted the order.
    Ack,
    /// Part or all of the order traded.
    Fill,
    /// Exchange refused the order.
    Reject,
    /// The order was cancelled.
    Cancel,
}

impl OrderEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::Ack => "ACK",
            OrderEventType::Fill => "FILL",
            OrderEventType::Reject => "REJECT",
            OrderEventType::Cancel => "CANCEL",
        }
    }
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification about an order's lifecycle change.
///
/// Produced by an exchange adapter (or its simulator), consumed by the order
/// state machine and republished on the bus. `exchange_order_id` travels on
/// the in-process channel only; the wire frame does not carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Client order id this event refers to.
    pub cl_ord_id: String,
    /// Exchange-assigned order id, empty if not (yet) known.
    pub exchange_order_id: String,
    /// Exchange name that produced the event.
    pub exch: String,
    /// Instrument symbol; may be empty on cancel requests.
    pub symbol: String,
    /// What happened.
    pub event_type: OrderEventType,
    /// Quantity of this execution (Fill events only, else 0.0).
    pub fill_qty: f64,
    /// Price of this execution (Fill events only, else 0.0).
    pub fill_price: f64,
    /// Free-text reason or status (reject reason, cancel origin, ...).
    pub text: String,
    /// Event time, microseconds since the Unix epoch.
    pub timestamp_us: i64,
}

impl OrderEvent {
    pub fn ack(
        cl_ord_id: impl Into<String>,
        exchange_order_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        timestamp_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: exchange_order_id.into(),
            exch: exch.into(),
            symbol: symbol.into(),
            event_type: OrderEventType::Ack,
            fill_qty: 0.0,
            fill_price: 0.0,
            text: String::new(),
            timestamp_us,
        }
    }

    pub fn fill(
        cl_ord_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        fill_qty: f64,
        fill_price: f64,
        timestamp_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: String::new(),
            exch: exch.into(),
            symbol: symbol.into(),
            event_type: OrderEventType::Fill,
            fill_qty,
            fill_price,
            text: String::new(),
            timestamp_us,
        }
    }

    pub fn reject(
        cl_ord_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        reason: impl Into<String>,
        timestamp_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: String::new(),
            exch: exch.into(),
            symbol: symbol.into(),
            event_type: OrderEventType::Reject,
            fill_qty: 0.0,
            fill_price: 0.0,
            text: reason.into(),
            timestamp_us,
        }
    }

    pub fn cancel(
        cl_ord_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        timestamp_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: String::new(),
            exch: exch.into(),
            symbol: symbol.into(),
            event_type: OrderEventType::Cancel,
            fill_qty: 0.0,
            fill_price: 0.0,
            text: String::new(),
            timestamp_us,
        }
    }

    pub fn with_exchange_order_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_order_id = id.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Immediate result of handing an order to an adapter.
///
/// This is transport-level feedback ("the request left the building"), not a
/// lifecycle event; acknowledgement arrives as an [`OrderEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub cl_ord_id: String,
    /// Exchange order id if the adapter learns it synchronously, else empty.
    pub exchange_order_id: String,
    /// Coarse disposition: "PENDING", "REJECTED", ...
    pub status: String,
    pub timestamp_us: i64,
}

impl OrderResponse {
    pub fn pending(cl_ord_id: impl Into<String>, timestamp_us: i64) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: String::new(),
            status: "PENDING".to_string(),
            timestamp_us,
        }
    }

    pub fn with_exchange_order_id(mut self, id: impl Into<String>) -> Self {
        self.exchange_order_id = id.into();
        self
    }
}

/// One executed trade, as reported by an adapter's trade-history accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub qty: f64,
    pub price: f64,
    pub trade_id: String,
    pub timestamp_us: i64,
}
