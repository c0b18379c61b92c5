//! Order side and the directional price comparisons that depend on it.

use std::fmt;

use crate::Price;

/// Side of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Limit rule: a buy accepts `price <= limit`, a sell accepts `price >= limit`.
    #[inline]
    pub fn limit_crossed(self, price: Price, limit: Price) -> bool {
        match self {
            Side::Buy => price <= limit,
            Side::Sell => price >= limit,
        }
    }

    /// Stop rule: a buy stop triggers at `price >= stop`, a sell stop at `price <= stop`.
    #[inline]
    pub fn stop_crossed(self, price: Price, stop: Price) -> bool {
        match self {
            Side::Buy => price >= stop,
            Side::Sell => price <= stop,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}
