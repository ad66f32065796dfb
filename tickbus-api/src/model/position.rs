use serde::{Deserialize, Serialize};

/// Net position in one instrument on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub exchange: String,
    pub symbol: String,
    /// Signed net quantity; positive is long.
    pub qty: f64,
    pub avg_price: f64,
    pub unrealized_pnl: f64,
    pub timestamp_us: i64,
}

/// Balance of one asset on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalanceInfo {
    pub exchange: String,
    pub asset: String,
    pub total: f64,
    pub available: f64,
    pub locked: f64,
    pub timestamp_us: i64,
}

/// A message on the position channel. Snapshots fully replace the previous
/// value for their key; there is no incremental merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionUpdate {
    Position(PositionInfo),
    Balance(AccountBalanceInfo),
}
