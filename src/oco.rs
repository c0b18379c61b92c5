//! One-cancels-other groups.
//!
//! The first member to fill closes the group and cancels every other
//! member in the same tick. Cancelling any member (or the group) cancels
//! all pending members and marks the group `Cancelled`.

use rustc_hash::FxHashMap;

use crate::error::{InvariantViolation, ValidationError};
use crate::store::OrderStore;
use crate::{GroupRef, OcoId, Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, Symbol, Timestamp};

/// One member of an OCO request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcoLeg {
    pub side: Side,
    pub kind: OrderKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub price: Option<Price>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stop_price: Option<Price>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub limit_price: Option<Price>,
}

impl OcoLeg {
    pub fn market(side: Side) -> Self {
        Self {
            side,
            kind: OrderKind::Market,
            price: None,
            stop_price: None,
            limit_price: None,
        }
    }

    pub fn limit(side: Side, price: Price) -> Self {
        Self {
            kind: OrderKind::Limit,
            price: Some(price),
            ..Self::market(side)
        }
    }

    pub fn stop(side: Side, stop_price: Price) -> Self {
        Self {
            kind: OrderKind::Stop,
            stop_price: Some(stop_price),
            ..Self::market(side)
        }
    }

    pub fn stop_limit(side: Side, stop_price: Price, limit_price: Price) -> Self {
        Self {
            kind: OrderKind::StopLimit,
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::market(side)
        }
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let positive = |p: Option<Price>, name: &'static str| match p {
            Some(p) if !p.is_positive() => Err(ValidationError::NonPositivePrice(name)),
            _ => Ok(()),
        };
        positive(self.price, "leg price")?;
        positive(self.stop_price, "leg stop price")?;
        positive(self.limit_price, "leg limit price")?;

        match self.kind {
            OrderKind::Market => Ok(()),
            OrderKind::Limit if self.price.is_none() => Err(ValidationError::MissingLimitPrice(index)),
            OrderKind::Limit => Ok(()),
            OrderKind::Stop if self.stop_price.is_none() => Err(ValidationError::MissingStopPrice(index)),
            OrderKind::Stop => Ok(()),
            OrderKind::StopLimit if self.stop_price.is_none() => {
                Err(ValidationError::MissingStopPrice(index))
            }
            OrderKind::StopLimit if self.limit_price.is_none() => {
                Err(ValidationError::MissingLimitPrice(index))
            }
            OrderKind::StopLimit => Ok(()),
        }
    }

    fn into_order(
        self,
        id: OrderId,
        symbol: Symbol,
        quantity: Quantity,
        now: Timestamp,
    ) -> Order {
        let mut order = Order::market(id, symbol, self.side, quantity, now);
        order.kind = self.kind;
        match self.kind {
            OrderKind::Market => {}
            OrderKind::Limit => order.price = self.price,
            OrderKind::Stop => order.stop_price = self.stop_price,
            OrderKind::StopLimit => {
                order.stop_price = self.stop_price;
                order.limit_price = self.limit_price;
            }
        }
        order
    }
}

/// Parameters of an OCO group.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcoRequest {
    pub symbol: Symbol,
    /// Quantity of every member.
    pub quantity: Quantity,
    pub legs: Vec<OcoLeg>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub expiry: Option<Timestamp>,
}

impl OcoRequest {
    pub fn new(symbol: Symbol, quantity: Quantity, legs: Vec<OcoLeg>) -> Self {
        Self {
            symbol,
            quantity,
            legs,
            expiry: None,
        }
    }

    /// Expire every member at `expiry`.
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
        if self.legs.len() < 2 {
            return Err(ValidationError::TooFewLegs(self.legs.len()));
        }
        for (index, leg) in self.legs.iter().enumerate() {
            leg.validate(index)?;
        }
        if self.expiry.is_some_and(|expiry| expiry <= now) {
            return Err(ValidationError::ExpiryNotInFuture);
        }
        Ok(())
    }
}

/// Ids handed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcoHandle {
    pub oco_id: OcoId,
    pub order_ids: Vec<OrderId>,
}

/// Lifecycle of an OCO group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OcoStatus {
    /// No member resolved yet
    Pending,
    /// Resolved by a fill
    Closed,
    /// Resolved by cancellation or expiry
    Cancelled,
}

/// An OCO group.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcoGroup {
    pub oco_id: OcoId,
    pub symbol: Symbol,
    /// Members in leg order.
    pub order_ids: Vec<OrderId>,
    pub status: OcoStatus,
}

/// OCO groups of one symbol.
#[derive(Clone, Debug, Default)]
pub struct OcoCoordinator {
    groups: FxHashMap<OcoId, OcoGroup>,
}

impl OcoCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the members of a validated request. `ids` has one id per leg.
    pub fn create(
        &mut self,
        store: &mut OrderStore,
        oco_id: OcoId,
        ids: &[OrderId],
        request: &OcoRequest,
        now: Timestamp,
    ) -> Result<OcoHandle, InvariantViolation> {
        for (index, (leg, id)) in request.legs.iter().zip(ids).enumerate() {
            let order = leg
                .into_order(*id, request.symbol, request.quantity, now)
                .with_group(GroupRef::Oco { id: oco_id, index })
                .with_expiry(request.expiry);
            store.insert(order)?;
        }
        let order_ids = ids.to_vec();
        self.groups.insert(
            oco_id,
            OcoGroup {
                oco_id,
                symbol: request.symbol,
                order_ids: order_ids.clone(),
                status: OcoStatus::Pending,
            },
        );
        Ok(OcoHandle { oco_id, order_ids })
    }

    /// Get a group by ID.
    pub fn get(&self, id: OcoId) -> Option<&OcoGroup> {
        self.groups.get(&id)
    }

    /// Resolve the group with `outcome`, cancelling every non-terminal member.
    ///
    /// A group that is already resolved keeps its status. Returns the
    /// members that were cancelled.
    pub fn settle(
        &mut self,
        id: OcoId,
        outcome: OcoStatus,
        store: &mut OrderStore,
    ) -> Result<Vec<OrderId>, InvariantViolation> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(InvariantViolation::MissingOco(id))?;
        let mut cancelled = Vec::new();
        for member in &group.order_ids {
            if store.set_status(*member, OrderStatus::Cancelled)? {
                cancelled.push(*member);
            }
        }
        if group.status == OcoStatus::Pending {
            group.status = outcome;
        }
        Ok(cancelled)
    }

    /// Groups that are still pending.
    pub fn open_count(&self) -> usize {
        self.groups
            .values()
            .filter(|g| g.status == OcoStatus::Pending)
            .count()
    }

    /// Drop resolved groups.
    pub fn clear_history(&mut self) {
        self.groups.retain(|_, g| g.status == OcoStatus::Pending);
    }
}
