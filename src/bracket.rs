//! Bracket orders: entry + stop-loss + take-profit.
//!
//! ```text
//! Pending --entry fills--> Active --SL or TP fills--> Closed
//!    |                       |
//!    +------ any leg cancelled / entry expired ------> Closed
//! ```
//!
//! Exit legs are registered at creation. With exit gating enabled (the
//! default) they are only evaluated once the group is `Active`.

use rustc_hash::FxHashMap;

use crate::error::{InvariantViolation, ValidationError};
use crate::store::OrderStore;
use crate::{
    BracketId, BracketRole, GroupRef, Order, OrderId, OrderStatus, Price, Quantity, Side, Symbol,
    Timestamp,
};

/// Parameters of a bracket order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BracketRequest {
    pub symbol: Symbol,
    /// Side of the entry; exits take the opposite side.
    pub side: Side,
    pub entry_price: Price,
    pub quantity: Quantity,
    pub stop_loss: Price,
    pub take_profit: Price,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trailing_enabled: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trailing_distance: i64,
    /// Expiry of the entry leg.
    #[cfg_attr(feature = "serde", serde(default))]
    pub expiry: Option<Timestamp>,
}

impl BracketRequest {
    /// A bracket without trailing or expiry.
    pub fn new(
        symbol: Symbol,
        side: Side,
        entry_price: Price,
        quantity: Quantity,
        stop_loss: Price,
        take_profit: Price,
    ) -> Self {
        Self {
            symbol,
            side,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            trailing_enabled: false,
            trailing_distance: 0,
            expiry: None,
        }
    }

    /// Trail the stop-loss leg by `distance` once the entry fills.
    pub fn with_trailing(mut self, distance: i64) -> Self {
        self.trailing_enabled = true;
        self.trailing_distance = distance;
        self
    }

    /// Expire the entry leg at `expiry` if it has not filled.
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Check every precondition. Nothing is created when this fails.
    pub fn validate(&self, now: Timestamp) -> Result<(), ValidationError> {
        if self.symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        if !self.entry_price.is_positive() {
            return Err(ValidationError::NonPositivePrice("entry price"));
        }
        if !self.stop_loss.is_positive() {
            return Err(ValidationError::NonPositivePrice("stop loss"));
        }
        if !self.take_profit.is_positive() {
            return Err(ValidationError::NonPositivePrice("take profit"));
        }
        match self.side {
            Side::Buy => {
                if self.stop_loss >= self.entry_price {
                    return Err(ValidationError::StopLossNotBelowEntry);
                }
                if self.take_profit <= self.entry_price {
                    return Err(ValidationError::TakeProfitNotAboveEntry);
                }
            }
            Side::Sell => {
                if self.stop_loss <= self.entry_price {
                    return Err(ValidationError::StopLossNotAboveEntry);
                }
                if self.take_profit >= self.entry_price {
                    return Err(ValidationError::TakeProfitNotBelowEntry);
                }
            }
        }
        if self.trailing_enabled && self.trailing_distance <= 0 {
            return Err(ValidationError::NonPositiveTrailDistance);
        }
        if self.expiry.is_some_and(|expiry| expiry <= now) {
            return Err(ValidationError::ExpiryNotInFuture);
        }
        Ok(())
    }
}

/// Ids handed back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BracketHandle {
    pub bracket_id: BracketId,
    pub entry_order_id: OrderId,
    pub stop_order_id: OrderId,
    pub take_profit_order_id: OrderId,
}

/// Lifecycle of a bracket group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BracketStatus {
    /// Entry not filled yet
    Pending,
    /// Entry filled, exits live
    Active,
    /// An exit filled or the group was cancelled
    Closed,
}

/// A bracket group.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BracketGroup {
    pub bracket_id: BracketId,
    pub symbol: Symbol,
    pub entry: OrderId,
    pub stop_loss: OrderId,
    pub take_profit: OrderId,
    pub trailing_enabled: bool,
    pub trailing_distance: i64,
    pub status: BracketStatus,
}

impl BracketGroup {
    /// Leg ids in registration order: entry, stop-loss, take-profit.
    pub fn legs(&self) -> [OrderId; 3] {
        [self.entry, self.stop_loss, self.take_profit]
    }
}

/// Bracket groups of one symbol.
#[derive(Clone, Debug, Default)]
pub struct BracketCoordinator {
    groups: FxHashMap<BracketId, BracketGroup>,
}

impl BracketCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the three legs of a validated request.
    ///
    /// `ids` are the entry, stop-loss and take-profit order ids, in that order.
    pub fn create(
        &mut self,
        store: &mut OrderStore,
        bracket_id: BracketId,
        ids: [OrderId; 3],
        request: &BracketRequest,
        now: Timestamp,
    ) -> Result<BracketHandle, InvariantViolation> {
        let [entry_id, stop_id, target_id] = ids;
        let exit_side = request.side.opposite();
        let tag = |role| GroupRef::Bracket {
            id: bracket_id,
            role,
        };

        let entry = Order::limit(
            entry_id,
            request.symbol,
            request.side,
            request.entry_price,
            request.quantity,
            now,
        )
        .with_group(tag(BracketRole::Entry))
        .with_expiry(request.expiry);
        let stop_loss = Order::stop(
            stop_id,
            request.symbol,
            exit_side,
            Some(request.stop_loss),
            request.quantity,
            now,
        )
        .with_group(tag(BracketRole::StopLoss));
        let take_profit = Order::limit(
            target_id,
            request.symbol,
            exit_side,
            request.take_profit,
            request.quantity,
            now,
        )
        .with_group(tag(BracketRole::TakeProfit));

        // Stop-loss is inserted before take-profit; the tick loop relies on it.
        store.insert(entry)?;
        store.insert(stop_loss)?;
        store.insert(take_profit)?;

        self.groups.insert(
            bracket_id,
            BracketGroup {
                bracket_id,
                symbol: request.symbol,
                entry: entry_id,
                stop_loss: stop_id,
                take_profit: target_id,
                trailing_enabled: request.trailing_enabled,
                trailing_distance: request.trailing_distance,
                status: BracketStatus::Pending,
            },
        );

        Ok(BracketHandle {
            bracket_id,
            entry_order_id: entry_id,
            stop_order_id: stop_id,
            take_profit_order_id: target_id,
        })
    }

    /// Get a group by ID.
    pub fn get(&self, id: BracketId) -> Option<&BracketGroup> {
        self.groups.get(&id)
    }

    /// Returns true if exit legs of this group may fill.
    pub fn exits_live(&self, id: BracketId) -> bool {
        self.groups
            .get(&id)
            .is_some_and(|g| g.status == BracketStatus::Active)
    }

    /// Mark the entry filled: `Pending -> Active`.
    pub fn on_entry_filled(&mut self, id: BracketId) -> Result<&BracketGroup, InvariantViolation> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingBracket(id))?;
        if group.status == BracketStatus::Pending {
            group.status = BracketStatus::Active;
        }
        Ok(group)
    }

    /// Close the group, cancelling every leg that is not terminal.
    ///
    /// Returns the legs that were cancelled. Closing a closed group is a no-op.
    pub fn close(
        &mut self,
        id: BracketId,
        store: &mut OrderStore,
    ) -> Result<Vec<OrderId>, InvariantViolation> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingBracket(id))?;
        let mut cancelled = Vec::new();
        for leg in group.legs() {
            if store.set_status(leg, OrderStatus::Cancelled)? {
                cancelled.push(leg);
            }
        }
        group.status = BracketStatus::Closed;
        Ok(cancelled)
    }

    /// Groups that are not closed.
    pub fn open_count(&self) -> usize {
        self.groups
            .values()
            .filter(|g| g.status != BracketStatus::Closed)
            .count()
    }

    /// Drop closed groups.
    pub fn clear_history(&mut self) {
        self.groups.retain(|_, g| g.status != BracketStatus::Closed);
    }
}
