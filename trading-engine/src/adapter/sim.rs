//! A simulated exchange.
//!
//! Fast enough to be invisible in tests, honest enough to exercise every
//! path of the engine: acknowledgements, dice-driven fills and rejects,
//! resting limit orders, cancels, native modifies, and position and balance
//! accounting derived from the fills it produces.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Sender;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tickbus::{
    AccountBalanceInfo, AdapterError, AdapterErrorKind, AdapterResult, ExchangeAdapter, Order,
    OrderEvent, OrderResponse, OrderType, PositionInfo, Trade,
};
use tickbus_core::oms::RateLimiter;

const EPS: f64 = 1e-12;

/// Behavioral knobs of the simulated exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimAdapterConfig {
    /// Chance that an accepted limit order fills immediately; otherwise it
    /// rests until cancelled or modified. Market orders always fill.
    #[serde(default = "default_fill_probability")]
    pub fill_probability: f64,
    /// Chance that an order is rejected outright.
    #[serde(default)]
    pub reject_probability: f64,
    /// Artificial latency applied to every request.
    #[serde(default)]
    pub response_delay_ms: u64,
    /// Request budget per minute, as a real venue would impose.
    #[serde(default = "default_requests_per_min")]
    pub requests_per_min: u32,
    /// Price market orders execute at.
    #[serde(default = "default_reference_price")]
    pub reference_price: f64,
    /// Starting quote balance.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
}

impl Default for SimAdapterConfig {
    fn default() -> Self {
        Self {
            fill_probability: default_fill_probability(),
            reject_probability: 0.0,
            response_delay_ms: 0,
            requests_per_min: default_requests_per_min(),
            reference_price: default_reference_price(),
            starting_balance: default_starting_balance(),
        }
    }
}

fn default_fill_probability() -> f64 {
    1.0
}

fn default_requests_per_min() -> u32 {
    1200
}

fn default_reference_price() -> f64 {
    50000.0
}

fn default_starting_balance() -> f64 {
    100_000.0
}

#[derive(Debug, Clone)]
struct RestingOrder {
    order: Order,
    exchange_order_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct NetPosition {
    qty: f64,
    avg_price: f64,
}

/// The simulated exchange adapter.
pub struct SimAdapter {
    exchange: String,
    config: SimAdapterConfig,
    events_tx: Sender<OrderEvent>,
    limiter: RateLimiter,
    rng: StdRng,
    connected: bool,
    resting: HashMap<String, RestingOrder>,
    positions: HashMap<String, NetPosition>,
    trades: Vec<Trade>,
    balance: f64,
    next_id: u64,
    orders_received: u64,
    rejects_emitted: u64,
}

impl SimAdapter {
    /// Creates a disconnected simulator emitting its events into `events_tx`.
    pub fn new(
        exchange: impl Into<String>,
        config: SimAdapterConfig,
        events_tx: Sender<OrderEvent>,
    ) -> Self {
        let limiter = RateLimiter::per_minute(config.requests_per_min);
        let balance = config.starting_balance;
        Self {
            exchange: exchange.into(),
            config,
            events_tx,
            limiter,
            rng: StdRng::from_entropy(),
            connected: false,
            resting: HashMap::new(),
            positions: HashMap::new(),
            trades: Vec::new(),
            balance,
            next_id: 0,
            orders_received: 0,
            rejects_emitted: 0,
        }
    }

    /// Fixes the dice for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn next_exchange_order_id(&mut self) -> String {
        self.next_id += 1;
        format!("SIM-{}", self.next_id)
    }

    fn require_connected(&self, operation: &str) -> AdapterResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(AdapterError::not_connected(
                self.exchange.as_str(),
                operation,
            ))
        }
    }

    fn simulate_latency(&self) {
        if self.config.response_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.response_delay_ms));
        }
    }

    fn emit(&self, event: OrderEvent) {
        // The engine side of the channel outlives the adapter in every
        // deployment; a closed channel here just means shutdown is underway.
        let _ = self.events_tx.send(event);
    }

    /// Books one execution: trade log, net position, quote balance, and the
    /// fill event.
    fn apply_fill(&mut self, order: &Order, qty: f64, price: f64) {
        let timestamp_us = Utc::now().timestamp_micros();
        self.trades.push(Trade {
            exchange: self.exchange.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty,
            price,
            trade_id: format!("T-{}", self.trades.len() + 1),
            timestamp_us,
        });

        let signed = qty * order.side.sign();
        let position = self.positions.entry(order.symbol.clone()).or_default();
        let new_qty = position.qty + signed;
        if position.qty.abs() < EPS {
            position.avg_price = price;
        } else if position.qty.signum() == signed.signum() {
            position.avg_price = (position.avg_price * position.qty.abs() + price * qty)
                / (position.qty.abs() + qty);
        } else if new_qty.signum() != position.qty.signum() && new_qty.abs() >= EPS {
            // Crossed through flat; the remainder opened at this price.
            position.avg_price = price;
        }
        position.qty = new_qty;
        if position.qty.abs() < EPS {
            *position = NetPosition::default();
        }
        self.balance -= signed * price;

        self.emit(OrderEvent::fill(
            order.cl_ord_id.as_str(),
            self.exchange.as_str(),
            order.symbol.as_str(),
            qty,
            price,
            timestamp_us,
        ));
    }
}

impl ExchangeAdapter for SimAdapter {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    fn connect(&mut self) -> AdapterResult<bool> {
        self.connected = true;
        info!("simulated exchange {} up", self.exchange);
        Ok(true)
    }

    fn disconnect(&mut self) {
        self.connected = false;
        info!("simulated exchange {} down", self.exchange);
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_order(&mut self, order: &Order) -> AdapterResult<OrderResponse> {
        self.require_connected("send_order")?;
        if !self.limiter.try_acquire() {
            return Err(AdapterError::rate_limited(
                self.exchange.as_str(),
                "send_order",
            ));
        }
        self.simulate_latency();
        self.orders_received += 1;
        let timestamp_us = Utc::now().timestamp_micros();

        if self.config.reject_probability > 0.0
            && self.rng.gen::<f64>() < self.config.reject_probability
        {
            self.rejects_emitted += 1;
            self.emit(OrderEvent::reject(
                order.cl_ord_id.as_str(),
                self.exchange.as_str(),
                order.symbol.as_str(),
                "Simulated reject",
                timestamp_us,
            ));
            return Ok(OrderResponse {
                cl_ord_id: order.cl_ord_id.clone(),
                exchange_order_id: String::new(),
                status: "REJECTED".to_string(),
                timestamp_us,
            });
        }

        let exchange_order_id = self.next_exchange_order_id();
        self.emit(OrderEvent::ack(
            order.cl_ord_id.as_str(),
            exchange_order_id.as_str(),
            self.exchange.as_str(),
            order.symbol.as_str(),
            timestamp_us,
        ));

        match order.order_type {
            OrderType::Market => {
                self.apply_fill(order, order.qty, self.config.reference_price);
            }
            OrderType::Limit => {
                if self.rng.gen::<f64>() < self.config.fill_probability {
                    self.apply_fill(order, order.qty, order.price);
                } else {
                    debug!("order {} resting at {}", order.cl_ord_id, order.price);
                    self.resting.insert(
                        order.cl_ord_id.clone(),
                        RestingOrder {
                            order: order.clone(),
                            exchange_order_id: exchange_order_id.clone(),
                        },
                    );
                }
            }
        }

        Ok(
            OrderResponse::pending(order.cl_ord_id.as_str(), timestamp_us)
                .with_exchange_order_id(exchange_order_id),
        )
    }

    fn cancel_order(&mut self, cl_ord_id: &str, exchange_order_id: &str) -> AdapterResult<bool> {
        self.require_connected("cancel_order")?;
        if !self.limiter.try_acquire() {
            return Err(AdapterError::rate_limited(
                self.exchange.as_str(),
                "cancel_order",
            ));
        }
        self.simulate_latency();
        // Resolve by client id first, then by exchange id.
        let key = if self.resting.contains_key(cl_ord_id) {
            Some(cl_ord_id.to_string())
        } else if exchange_order_id.is_empty() {
            None
        } else {
            self.resting
                .iter()
                .find(|(_, resting)| resting.exchange_order_id == exchange_order_id)
                .map(|(key, _)| key.clone())
        };
        match key.and_then(|key| self.resting.remove(&key)) {
            Some(resting) => {
                self.emit(OrderEvent::cancel(
                    resting.order.cl_ord_id.as_str(),
                    self.exchange.as_str(),
                    resting.order.symbol.as_str(),
                    Utc::now().timestamp_micros(),
                ));
                Ok(true)
            }
            None => Err(AdapterError::order_not_found(
                self.exchange.as_str(),
                cl_ord_id,
            )),
        }
    }

    fn modify_order(
        &mut self,
        cl_ord_id: &str,
        _exchange_order_id: &str,
        new_price: f64,
        new_qty: f64,
    ) -> AdapterResult<bool> {
        self.require_connected("modify_order")?;
        self.simulate_latency();
        match self.resting.get_mut(cl_ord_id) {
            Some(resting) => {
                resting.order.price = new_price;
                resting.order.qty = new_qty;
                debug!("order {} modified to {} @ {}", cl_ord_id, new_qty, new_price);
                Ok(true)
            }
            None => Err(AdapterError::new(
                AdapterErrorKind::OrderNotFound,
                self.exchange.as_str(),
                "modify_order",
                format!("unknown order {}", cl_ord_id),
            )),
        }
    }

    fn positions(&self) -> AdapterResult<Vec<PositionInfo>> {
        let timestamp_us = Utc::now().timestamp_micros();
        Ok(self
            .positions
            .iter()
            .filter(|(_, position)| position.qty.abs() >= EPS)
            .map(|(symbol, position)| PositionInfo {
                exchange: self.exchange.clone(),
                symbol: symbol.clone(),
                qty: position.qty,
                avg_price: position.avg_price,
                unrealized_pnl: (self.config.reference_price - position.avg_price)
                    * position.qty,
                timestamp_us,
            })
            .collect())
    }

    fn balances(&self) -> AdapterResult<Vec<AccountBalanceInfo>> {
        Ok(vec![AccountBalanceInfo {
            exchange: self.exchange.clone(),
            asset: "USDT".to_string(),
            total: self.balance,
            available: self.balance,
            locked: 0.0,
            timestamp_us: Utc::now().timestamp_micros(),
        }])
    }

    fn open_orders(&self) -> AdapterResult<Vec<Order>> {
        Ok(self
            .resting
            .values()
            .map(|resting| resting.order.clone())
            .collect())
    }

    fn trade_history(&self) -> AdapterResult<Vec<Trade>> {
        Ok(self.trades.clone())
    }

    fn health(&self) -> HashMap<String, String> {
        let mut health = HashMap::new();
        health.insert("exchange".to_string(), self.exchange.clone());
        health.insert("connected".to_string(), self.connected.to_string());
        health.insert("resting_orders".to_string(), self.resting.len().to_string());
        health
    }

    fn metrics(&self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        metrics.insert("orders_received".to_string(), self.orders_received as f64);
        metrics.insert("trades".to_string(), self.trades.len() as f64);
        metrics.insert("rejects".to_string(), self.rejects_emitted as f64);
        metrics.insert("balance".to_string(), self.balance);
        metrics.insert("rate_remaining".to_string(), self.limiter.remaining() as f64);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};
    use tickbus::{OrderEventType, Side};

    fn connected(config: SimAdapterConfig) -> (SimAdapter, Receiver<OrderEvent>) {
        let (tx, rx) = unbounded();
        let mut adapter = SimAdapter::new("SIM", config, tx).with_seed(7);
        adapter.connect().unwrap();
        (adapter, rx)
    }

    fn limit(cl_ord_id: &str, side: Side, qty: f64, price: f64) -> Order {
        Order::limit(
            cl_ord_id,
            "SIM",
            "BTCUSDT",
            side,
            qty,
            price,
            1_700_000_000_000_000,
        )
    }

    #[test]
    fn market_orders_fill_at_the_reference_price() {
        let (mut adapter, rx) = connected(SimAdapterConfig::default());
        let order = Order::market("M1", "SIM", "BTCUSDT", Side::Buy, 0.5, 1_700_000_000_000_000);
        let response = adapter.send_order(&order).unwrap();
        assert_eq!(response.status, "PENDING");
        assert_eq!(response.exchange_order_id, "SIM-1");

        let ack = rx.try_recv().unwrap();
        assert_eq!(ack.event_type, OrderEventType::Ack);
        assert_eq!(ack.exchange_order_id, "SIM-1");
        let fill = rx.try_recv().unwrap();
        assert_eq!(fill.event_type, OrderEventType::Fill);
        assert_eq!(fill.fill_qty, 0.5);
        assert_eq!(fill.fill_price, 50000.0);
    }

    #[test]
    fn limit_orders_fill_at_their_own_price() {
        let (mut adapter, rx) = connected(SimAdapterConfig::default());
        adapter
            .send_order(&limit("L1", Side::Buy, 0.1, 49500.0))
            .unwrap();
        let ack = rx.try_recv().unwrap();
        assert_eq!(ack.event_type, OrderEventType::Ack);
        let fill = rx.try_recv().unwrap();
        assert_eq!(fill.event_type, OrderEventType::Fill);
        assert_eq!(fill.fill_price, 49500.0);
        assert!(adapter.open_orders().unwrap().is_empty());
        assert_eq!(adapter.trade_history().unwrap().len(), 1);
    }

    #[test]
    fn unlucky_limit_orders_rest_until_cancelled() {
        let config = SimAdapterConfig {
            fill_probability: 0.0,
            ..Default::default()
        };
        let (mut adapter, rx) = connected(config);
        adapter
            .send_order(&limit("R1", Side::Buy, 0.1, 49000.0))
            .unwrap();
        let ack = rx.try_recv().unwrap();
        assert_eq!(ack.event_type, OrderEventType::Ack);
        assert!(rx.try_recv().is_err());

        let open = adapter.open_orders().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].cl_ord_id, "R1");

        assert!(adapter.cancel_order("R1", "SIM-1").unwrap());
        let cancel = rx.try_recv().unwrap();
        assert_eq!(cancel.event_type, OrderEventType::Cancel);
        assert_eq!(cancel.cl_ord_id, "R1");
        assert!(adapter.open_orders().unwrap().is_empty());
    }

    #[test]
    fn cancel_by_exchange_id_finds_the_resting_order() {
        let config = SimAdapterConfig {
            fill_probability: 0.0,
            ..Default::default()
        };
        let (mut adapter, rx) = connected(config);
        adapter
            .send_order(&limit("R2", Side::Buy, 0.1, 49000.0))
            .unwrap();
        let _ack = rx.try_recv().unwrap();

        // The client id is stale, the exchange id still resolves it.
        assert!(adapter.cancel_order("stale", "SIM-1").unwrap());
        let cancel = rx.try_recv().unwrap();
        assert_eq!(cancel.cl_ord_id, "R2");
    }

    #[test]
    fn cancel_of_an_unknown_order_reports_order_not_found() {
        let (mut adapter, _rx) = connected(SimAdapterConfig::default());
        let err = adapter.cancel_order("NOPE", "").unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::OrderNotFound);
    }

    #[test]
    fn forced_rejects_emit_an_event_and_touch_nothing() {
        let config = SimAdapterConfig {
            reject_probability: 1.0,
            ..Default::default()
        };
        let (mut adapter, rx) = connected(config);
        let response = adapter
            .send_order(&limit("J1", Side::Buy, 1.0, 50000.0))
            .unwrap();
        assert_eq!(response.status, "REJECTED");
        assert!(response.exchange_order_id.is_empty());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, OrderEventType::Reject);
        assert_eq!(event.text, "Simulated reject");
        assert!(adapter.positions().unwrap().is_empty());
        assert!(adapter.trade_history().unwrap().is_empty());
        assert_eq!(adapter.balances().unwrap()[0].total, 100_000.0);
    }

    #[test]
    fn modify_reprices_a_resting_order_in_place() {
        let config = SimAdapterConfig {
            fill_probability: 0.0,
            ..Default::default()
        };
        let (mut adapter, _rx) = connected(config);
        adapter
            .send_order(&limit("M1", Side::Sell, 0.2, 51000.0))
            .unwrap();
        assert!(adapter.modify_order("M1", "SIM-1", 50500.0, 0.3).unwrap());
        let open = adapter.open_orders().unwrap();
        assert_eq!(open[0].price, 50500.0);
        assert_eq!(open[0].qty, 0.3);

        let err = adapter.modify_order("GONE", "", 1.0, 1.0).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::OrderNotFound);
    }

    #[test]
    fn fills_move_position_and_balance_and_selling_back_flattens() {
        let (mut adapter, _rx) = connected(SimAdapterConfig::default());
        adapter
            .send_order(&limit("B1", Side::Buy, 0.1, 50000.0))
            .unwrap();

        let positions = adapter.positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert!((positions[0].qty - 0.1).abs() < 1e-9);
        assert!((positions[0].avg_price - 50000.0).abs() < 1e-9);
        assert!((adapter.balances().unwrap()[0].total - 95_000.0).abs() < 1e-6);

        adapter
            .send_order(&limit("S1", Side::Sell, 0.1, 50000.0))
            .unwrap();
        assert!(adapter.positions().unwrap().is_empty());
        assert!((adapter.balances().unwrap()[0].total - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn adds_average_and_flips_reprice_through_flat() {
        let (mut adapter, _rx) = connected(SimAdapterConfig::default());
        adapter
            .send_order(&limit("A1", Side::Buy, 1.0, 50000.0))
            .unwrap();
        adapter
            .send_order(&limit("A2", Side::Buy, 1.0, 51000.0))
            .unwrap();
        let positions = adapter.positions().unwrap();
        assert!((positions[0].avg_price - 50500.0).abs() < 1e-9);

        // Selling 3 closes the 2 and opens a 1-lot short at the sale price.
        adapter
            .send_order(&limit("A3", Side::Sell, 3.0, 52000.0))
            .unwrap();
        let positions = adapter.positions().unwrap();
        assert!((positions[0].qty + 1.0).abs() < 1e-9);
        assert!((positions[0].avg_price - 52000.0).abs() < 1e-9);
    }

    #[test]
    fn the_request_budget_applies_to_sends_and_cancels() {
        let config = SimAdapterConfig {
            requests_per_min: 1,
            ..Default::default()
        };
        let (mut adapter, _rx) = connected(config);
        adapter
            .send_order(&limit("F1", Side::Buy, 0.1, 50000.0))
            .unwrap();
        let err = adapter
            .send_order(&limit("F2", Side::Buy, 0.1, 50000.0))
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::RateLimitExceeded);
        let err = adapter.cancel_order("F1", "").unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::RateLimitExceeded);
    }

    #[test]
    fn requests_before_connect_are_refused() {
        let (tx, _rx) = unbounded();
        let mut adapter = SimAdapter::new("SIM", SimAdapterConfig::default(), tx);
        let err = adapter
            .send_order(&limit("N1", Side::Buy, 0.1, 50000.0))
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::NotConnected);
        adapter.connect().unwrap();
        assert!(adapter.is_connected());
        adapter.disconnect();
        assert!(!adapter.is_connected());
    }
}
