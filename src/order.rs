//! Order representation and lifecycle.

use std::fmt;

use crate::{BracketId, OcoId, OrderId, Price, Quantity, Side, Symbol, Timestamp};

/// How an order decides whether a tick fills it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Status of an order in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderStatus {
    /// Registered, waiting for a tick to fill it
    #[default]
    Pending,
    /// Fully executed
    Filled,
    /// Removed by the caller or by a group cascade
    Cancelled,
    /// Reached its expiry before filling
    Expired,
    /// Reserved; the engine fills whole orders only
    Partial,
}

impl OrderStatus {
    /// Returns true if the order can still fill or be cancelled.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Partial)
    }

    /// Returns true if the order is terminal (no further state changes).
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }
}

/// Role of an order inside a bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BracketRole {
    /// Opens the position
    Entry,
    /// Protective exit, opposite side
    StopLoss,
    /// Profit exit, opposite side
    TakeProfit,
}

impl fmt::Display for BracketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketRole::Entry => write!(f, "entry"),
            BracketRole::StopLoss => write!(f, "stop_loss"),
            BracketRole::TakeProfit => write!(f, "take_profit"),
        }
    }
}

/// The single group an order belongs to, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupRef {
    Bracket { id: BracketId, role: BracketRole },
    Oco { id: OcoId, index: usize },
}

/// A tracked order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    /// Identifier assigned by the engine
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    /// Requested quantity
    pub quantity: Quantity,
    /// Limit price (Limit orders)
    pub price: Option<Price>,
    /// Trigger price (Stop and StopLimit orders, trailing stops once armed)
    pub stop_price: Option<Price>,
    /// Limit applied after the stop triggers (StopLimit only)
    pub limit_price: Option<Price>,
    pub status: OrderStatus,
    /// Either 0 or `quantity`
    pub filled_quantity: Quantity,
    pub average_fill_price: Option<Price>,
    pub created_at: Timestamp,
    pub expiry: Option<Timestamp>,
    pub group_ref: Option<GroupRef>,
}

impl Order {
    fn base(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        kind: OrderKind,
        quantity: Quantity,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            kind,
            quantity,
            price: None,
            stop_price: None,
            limit_price: None,
            status: OrderStatus::Pending,
            filled_quantity: 0,
            average_fill_price: None,
            created_at,
            expiry: None,
            group_ref: None,
        }
    }

    /// A market order: fills on the next tick.
    pub fn market(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        created_at: Timestamp,
    ) -> Self {
        Self::base(id, symbol, side, OrderKind::Market, quantity, created_at)
    }

    /// A limit order at `price`.
    pub fn limit(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
        created_at: Timestamp,
    ) -> Self {
        let mut order = Self::base(id, symbol, side, OrderKind::Limit, quantity, created_at);
        order.price = Some(price);
        order
    }

    /// A stop order. `stop_price` may be `None` for a trailing stop that has
    /// not computed its first level yet.
    pub fn stop(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        stop_price: Option<Price>,
        quantity: Quantity,
        created_at: Timestamp,
    ) -> Self {
        let mut order = Self::base(id, symbol, side, OrderKind::Stop, quantity, created_at);
        order.stop_price = stop_price;
        order
    }

    /// A stop-limit order.
    pub fn stop_limit(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        stop_price: Price,
        limit_price: Price,
        quantity: Quantity,
        created_at: Timestamp,
    ) -> Self {
        let mut order = Self::base(id, symbol, side, OrderKind::StopLimit, quantity, created_at);
        order.stop_price = Some(stop_price);
        order.limit_price = Some(limit_price);
        order
    }

    /// Attach the owning group.
    pub fn with_group(mut self, group: GroupRef) -> Self {
        self.group_ref = Some(group);
        self
    }

    /// Set an expiry timestamp.
    pub fn with_expiry(mut self, expiry: Option<Timestamp>) -> Self {
        self.expiry = expiry;
        self
    }

    /// Returns true if the order can still fill or be cancelled.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if the order is terminal.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The bracket role, if this order is a bracket leg.
    pub fn bracket_role(&self) -> Option<BracketRole> {
        match self.group_ref {
            Some(GroupRef::Bracket { role, .. }) => Some(role),
            _ => None,
        }
    }

    /// Fill the whole order at `price`.
    ///
    /// # Panics
    ///
    /// Panics if the order is already terminal.
    pub fn fill(&mut self, price: Price) {
        assert!(
            self.is_active(),
            "cannot fill order {} in terminal state {:?}",
            self.id,
            self.status
        );
        self.filled_quantity = self.quantity;
        self.average_fill_price = Some(price);
        self.status = OrderStatus::Filled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_order() -> Order {
        Order::limit(
            OrderId(1),
            Symbol::new("EURUSD"),
            Side::Buy,
            Price(1_0850),
            1000,
            7,
        )
    }

    #[test]
    fn new_order_initial_state() {
        let order = make_order();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.filled_quantity, 0);
        assert_eq!(order.average_fill_price, None);
        assert_eq!(order.price, Some(Price(1_0850)));
        assert_eq!(order.created_at, 7);
        assert!(order.group_ref.is_none());
        assert!(order.is_active());
    }

    #[test]
    fn fill_is_whole() {
        let mut order = make_order();
        order.fill(Price(1_0840));

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, 1000);
        assert_eq!(order.average_fill_price, Some(Price(1_0840)));
        assert!(order.is_terminal());
    }

    #[test]
    #[should_panic(expected = "cannot fill order O1 in terminal state")]
    fn fill_twice_panics() {
        let mut order = make_order();
        order.fill(Price(1_0840));
        order.fill(Price(1_0840));
    }

    #[test]
    fn stop_limit_keeps_prices_apart() {
        let order = Order::stop_limit(
            OrderId(2),
            Symbol::new("BTC"),
            Side::Buy,
            Price(105),
            Price(106),
            3,
            0,
        );
        assert_eq!(order.price, None);
        assert_eq!(order.stop_price, Some(Price(105)));
        assert_eq!(order.limit_price, Some(Price(106)));
    }

    #[test]
    fn group_role() {
        let order = make_order().with_group(GroupRef::Bracket {
            id: BracketId(1),
            role: BracketRole::StopLoss,
        });
        assert_eq!(order.bracket_role(), Some(BracketRole::StopLoss));

        let order = make_order().with_group(GroupRef::Oco {
            id: OcoId(1),
            index: 0,
        });
        assert_eq!(order.bracket_role(), None);
    }

    #[test]
    fn status_classes() {
        assert!(OrderStatus::Pending.is_active());
        assert!(!OrderStatus::Pending.is_terminal());
        for status in [OrderStatus::Filled, OrderStatus::Cancelled, OrderStatus::Expired] {
            assert!(status.is_terminal());
            assert!(!status.is_active());
        }
    }
}
