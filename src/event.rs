//! Events produced by price ticks.

use std::fmt;

use crate::{OrderId, Price, Quantity, Side, Symbol};

/// Something a tick did that the caller should report.
///
/// Cascade cancellations are not reported individually; the group status
/// and the cancelled orders are visible through the engine's queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Event {
    /// An order filled completely.
    OrderFilled {
        order_id: OrderId,
        symbol: Symbol,
        price: Price,
        quantity: Quantity,
        side: Side,
    },
    /// A trailing stop's level was crossed. Always followed by the
    /// `OrderFilled` of the same order.
    TrailingStopTriggered {
        order_id: OrderId,
        symbol: Symbol,
        price: Price,
        stop_price: Price,
    },
    /// An order reached its expiry before filling.
    OrderExpired { order_id: OrderId, symbol: Symbol },
}

impl Event {
    /// The order this event is about.
    pub fn order_id(&self) -> OrderId {
        match *self {
            Event::OrderFilled { order_id, .. }
            | Event::TrailingStopTriggered { order_id, .. }
            | Event::OrderExpired { order_id, .. } => order_id,
        }
    }

    /// The symbol of the tick that produced this event.
    pub fn symbol(&self) -> Symbol {
        match *self {
            Event::OrderFilled { symbol, .. }
            | Event::TrailingStopTriggered { symbol, .. }
            | Event::OrderExpired { symbol, .. } => symbol,
        }
    }

    /// Returns true for fills.
    pub fn is_fill(&self) -> bool {
        matches!(self, Event::OrderFilled { .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::OrderFilled {
                order_id,
                symbol,
                price,
                quantity,
                side,
            } => write!(f, "FILLED {order_id} {side} {quantity} {symbol} @ {price}"),
            Event::TrailingStopTriggered {
                order_id,
                symbol,
                price,
                stop_price,
            } => write!(f, "TRAILING STOP {order_id} {symbol} hit {stop_price} (tick {price})"),
            Event::OrderExpired { order_id, symbol } => write!(f, "EXPIRED {order_id} {symbol}"),
        }
    }
}
