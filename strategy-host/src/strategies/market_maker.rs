//! A two-sided quoting strategy.
//!
//! On every book snapshot it recomputes a bid and an ask around the mid
//! price. The half-spread starts at `min_spread_bps` and widens by 10 bps per
//! unit of inventory skew (inventory over `max_position`, clamped to ±1),
//! capped at 100 bps; on top of that the loaded side backs its quote off by
//! up to one extra half-spread. A side that would push inventory past
//! `max_position` stops quoting. Live quotes are cancel-then-replaced when
//! the desired price drifts more than `requote_tolerance_bps` from the
//! resting one.
//!
//! Inventory comes from position snapshots; fill events only clear the
//! affected quote slot so the next book replaces it.

use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use tickbus::{
    Order, OrderAction, OrderBookSnapshot, OrderEvent, OrderEventType, PositionInfo, Side,
    Strategy,
};
use uuid::Uuid;

const SKEW_WIDENING_BPS: f64 = 10.0;
const MAX_SPREAD_BPS: f64 = 100.0;
const POSITION_EPS: f64 = 1e-9;

/// Quoting knobs for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMakerConfig {
    pub symbol: String,
    /// Quantity per quote.
    #[serde(default = "default_quote_size")]
    pub quote_size: f64,
    /// Half-spread at flat inventory, in basis points of mid.
    #[serde(default = "default_min_spread_bps")]
    pub min_spread_bps: f64,
    /// Absolute inventory bound; the side that would exceed it goes quiet.
    #[serde(default = "default_max_position")]
    pub max_position: f64,
    /// Quotes are rounded away from mid onto this grid.
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    /// Price drift (in bps of mid) a live quote tolerates before it is
    /// cancel-then-replaced.
    #[serde(default = "default_requote_tolerance_bps")]
    pub requote_tolerance_bps: f64,
}

fn default_quote_size() -> f64 {
    0.01
}

fn default_min_spread_bps() -> f64 {
    10.0
}

fn default_max_position() -> f64 {
    0.1
}

fn default_tick_size() -> f64 {
    0.1
}

fn default_requote_tolerance_bps() -> f64 {
    5.0
}

#[derive(Debug, Clone)]
struct LiveQuote {
    cl_ord_id: String,
    price: f64,
}

struct DesiredQuotes {
    bid: Option<f64>,
    ask: Option<f64>,
}

/// The strategy instance. One per process, driven by the container.
pub struct MarketMaker {
    exchange: String,
    config: MarketMakerConfig,
    inventory: f64,
    bid: Option<LiveQuote>,
    ask: Option<LiveQuote>,
}

impl MarketMaker {
    pub fn new(exchange: impl Into<String>, config: MarketMakerConfig) -> Self {
        Self {
            exchange: exchange.into(),
            config,
            inventory: 0.0,
            bid: None,
            ask: None,
        }
    }

    fn desired_quotes(&self, mid: f64) -> DesiredQuotes {
        let max_position = self.config.max_position;
        let skew = if max_position > 0.0 {
            (self.inventory / max_position).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let spread_bps =
            (self.config.min_spread_bps + skew.abs() * SKEW_WIDENING_BPS).min(MAX_SPREAD_BPS);
        let half = mid * spread_bps / 20_000.0;

        let bid = if self.inventory + self.config.quote_size > max_position + POSITION_EPS {
            None
        } else {
            Some(floor_to_tick(
                mid - half * (1.0 + skew.max(0.0)),
                self.config.tick_size,
            ))
        };
        let ask = if self.inventory - self.config.quote_size < -max_position - POSITION_EPS {
            None
        } else {
            Some(ceil_to_tick(
                mid + half * (1.0 - skew.min(0.0)),
                self.config.tick_size,
            ))
        };
        DesiredQuotes { bid, ask }
    }
}

impl Strategy for MarketMaker {
    fn name(&self) -> &str {
        "market-maker"
    }

    fn on_book(&mut self, book: &OrderBookSnapshot) -> Vec<OrderAction> {
        if book.symbol != self.config.symbol {
            return Vec::new();
        }
        let mid = match book.mid_price() {
            Some(mid) => mid,
            None => return Vec::new(),
        };
        let desired = self.desired_quotes(mid);
        let tolerance = mid * self.config.requote_tolerance_bps / 10_000.0;

        let mut actions = Vec::new();
        reconcile_side(
            &mut self.bid,
            desired.bid,
            Side::Buy,
            tolerance,
            &self.exchange,
            &self.config,
            &mut actions,
        );
        reconcile_side(
            &mut self.ask,
            desired.ask,
            Side::Sell,
            tolerance,
            &self.exchange,
            &self.config,
            &mut actions,
        );
        actions
    }

    fn on_order_event(&mut self, event: &OrderEvent) -> Vec<OrderAction> {
        if !matches!(
            event.event_type,
            OrderEventType::Fill | OrderEventType::Cancel | OrderEventType::Reject
        ) {
            return Vec::new();
        }
        if self
            .bid
            .as_ref()
            .is_some_and(|live| live.cl_ord_id == event.cl_ord_id)
        {
            debug!("bid quote {} closed by {}", event.cl_ord_id, event.event_type);
            self.bid = None;
        } else if self
            .ask
            .as_ref()
            .is_some_and(|live| live.cl_ord_id == event.cl_ord_id)
        {
            debug!("ask quote {} closed by {}", event.cl_ord_id, event.event_type);
            self.ask = None;
        }
        Vec::new()
    }

    fn on_position(&mut self, position: &PositionInfo) -> Vec<OrderAction> {
        if position.exchange == self.exchange && position.symbol == self.config.symbol {
            self.inventory = position.qty;
        }
        Vec::new()
    }

    fn on_stop(&mut self) -> Vec<OrderAction> {
        let mut actions = Vec::new();
        if let Some(live) = self.bid.take() {
            actions.push(OrderAction::Cancel {
                cl_ord_id: live.cl_ord_id,
            });
        }
        if let Some(live) = self.ask.take() {
            actions.push(OrderAction::Cancel {
                cl_ord_id: live.cl_ord_id,
            });
        }
        actions
    }
}

fn reconcile_side(
    slot: &mut Option<LiveQuote>,
    desired: Option<f64>,
    side: Side,
    tolerance: f64,
    exchange: &str,
    config: &MarketMakerConfig,
    actions: &mut Vec<OrderAction>,
) {
    match (slot.as_ref(), desired) {
        (None, None) => {}
        (Some(live), None) => {
            actions.push(OrderAction::Cancel {
                cl_ord_id: live.cl_ord_id.clone(),
            });
            *slot = None;
        }
        (None, Some(price)) => {
            *slot = Some(place_quote(side, price, exchange, config, actions));
        }
        (Some(live), Some(price)) => {
            if (price - live.price).abs() > tolerance {
                actions.push(OrderAction::Cancel {
                    cl_ord_id: live.cl_ord_id.clone(),
                });
                *slot = Some(place_quote(side, price, exchange, config, actions));
            }
        }
    }
}

fn place_quote(
    side: Side,
    price: f64,
    exchange: &str,
    config: &MarketMakerConfig,
    actions: &mut Vec<OrderAction>,
) -> LiveQuote {
    let cl_ord_id = Uuid::new_v4().simple().to_string();
    let order = Order::limit(
        cl_ord_id.as_str(),
        exchange,
        config.symbol.as_str(),
        side,
        config.quote_size,
        price,
        Utc::now().timestamp_micros(),
    );
    actions.push(OrderAction::Place(order));
    LiveQuote { cl_ord_id, price }
}

fn floor_to_tick(price: f64, tick: f64) -> f64 {
    if tick <= 0.0 {
        return price;
    }
    (price / tick).floor() * tick
}

fn ceil_to_tick(price: f64, tick: f64) -> f64 {
    if tick <= 0.0 {
        return price;
    }
    (price / tick).ceil() * tick
}
