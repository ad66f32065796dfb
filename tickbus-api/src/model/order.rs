use serde::{Deserialize, Serialize};

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Signed unit for position arithmetic: +1 for Buy, -1 for Sell.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    /// The side that trades against this one.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution style of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Rests at `price` until filled or cancelled.
    Limit,
    /// Executes immediately at the best available price; `price` is ignored.
    Market,
}

impl OrderType {
    pub fn is_market(&self) -> bool {
        matches!(self, OrderType::Market)
    }
}

/// An intent to trade.
///
/// The order is immutable once created; all lifecycle state (acknowledgement,
/// fills, the exchange-assigned id) lives on the tracked record owned by the
/// order table, never on the order itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Client-assigned order id, unique for the life of the owning process.
    pub cl_ord_id: String,
    /// Exchange name this order is routed to (e.g. "SIM").
    pub exch: String,
    /// Instrument symbol (e.g. "BTCUSDT").
    pub symbol: String,
    /// Buy or Sell.
    pub side: Side,
    /// Limit or Market.
    pub order_type: OrderType,
    /// Quantity, must be > 0.
    pub qty: f64,
    /// Limit price; 0.0 by convention for market orders.
    pub price: f64,
    /// Creation time, microseconds since the Unix epoch.
    pub created_us: i64,
}

impl Order {
    /// Creates a limit order.
    pub fn limit(
        cl_ord_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        qty: f64,
        price: f64,
        created_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exch: exch.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            qty,
            price,
            created_us,
        }
    }

    /// Creates a market order (price fixed at 0.0).
    pub fn market(
        cl_ord_id: impl Into<String>,
        exch: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        qty: f64,
        created_us: i64,
    ) -> Self {
        Self {
            cl_ord_id: cl_ord_id.into(),
            exch: exch.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            qty,
            price: 0.0,
            created_us,
        }
    }

    /// Signed quantity: positive for Buy, negative for Sell.
    pub fn signed_qty(&self) -> f64 {
        self.side.sign() * self.qty
    }
}
