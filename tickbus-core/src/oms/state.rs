//! Order lifecycle states and the transition rules between them.

use std::fmt;

use tickbus::OrderEventType;

/// Lifecycle state of a tracked order.
///
/// `Filled`, `Cancelled` and `Rejected` are terminal: once reached, no event
/// moves the order anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Acknowledged,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the state an order moves to when an event is applied.
///
/// Returns `None` when the order is already terminal. Fill events look at the
/// cumulative filled quantity, so an order goes straight to `Filled` when a
/// single execution covers the full size, and a fill that arrives before the
/// acknowledgement still advances the order.
pub fn next_state(
    current: OrderState,
    event_type: OrderEventType,
    cumulative_filled: f64,
    order_qty: f64,
) -> Option<OrderState> {
    if current.is_terminal() {
        return None;
    }
    Some(match event_type {
        OrderEventType::Ack => {
            if current == OrderState::Pending {
                OrderState::Acknowledged
            } else {
                current
            }
        }
        OrderEventType::Fill => {
            if cumulative_filled >= order_qty {
                OrderState::Filled
            } else {
                OrderState::PartiallyFilled
            }
        }
        OrderEventType::Reject => OrderState::Rejected,
        OrderEventType::Cancel => OrderState::Cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_accept_nothing() {
        for state in [OrderState::Filled, OrderState::Cancelled, OrderState::Rejected] {
            for event in [
                OrderEventType::Ack,
                OrderEventType::Fill,
                OrderEventType::Reject,
                OrderEventType::Cancel,
            ] {
                assert_eq!(next_state(state, event, 1.0, 1.0), None);
            }
        }
    }

    #[test]
    fn ack_only_advances_pending() {
        assert_eq!(
            next_state(OrderState::Pending, OrderEventType::Ack, 0.0, 1.0),
            Some(OrderState::Acknowledged)
        );
        assert_eq!(
            next_state(OrderState::PartiallyFilled, OrderEventType::Ack, 0.5, 1.0),
            Some(OrderState::PartiallyFilled)
        );
    }

    #[test]
    fn fill_threshold_is_cumulative_quantity() {
        assert_eq!(
            next_state(OrderState::Acknowledged, OrderEventType::Fill, 0.4, 1.0),
            Some(OrderState::PartiallyFilled)
        );
        assert_eq!(
            next_state(OrderState::PartiallyFilled, OrderEventType::Fill, 1.0, 1.0),
            Some(OrderState::Filled)
        );
    }

    #[test]
    fn fill_before_ack_is_tolerated() {
        assert_eq!(
            next_state(OrderState::Pending, OrderEventType::Fill, 1.0, 1.0),
            Some(OrderState::Filled)
        );
    }

    #[test]
    fn cancel_and_reject_close_from_any_open_state() {
        for state in [
            OrderState::Pending,
            OrderState::Acknowledged,
            OrderState::PartiallyFilled,
        ] {
            assert_eq!(
                next_state(state, OrderEventType::Cancel, 0.0, 1.0),
                Some(OrderState::Cancelled)
            );
            assert_eq!(
                next_state(state, OrderEventType::Reject, 0.0, 1.0),
                Some(OrderState::Rejected)
            );
        }
    }
}
