//! OrderStore: the canonical id -> order map.

use rustc_hash::FxHashMap;

use crate::error::StoreError;
use crate::{Order, OrderId, OrderStatus, Price, Symbol};

/// Owns every order and remembers insertion order.
///
/// Insertion order is the evaluation order on a tick, so it must stay stable.
#[derive(Clone, Debug, Default)]
pub struct OrderStore {
    orders: FxHashMap<OrderId, Order>,
    sequence: Vec<OrderId>,
}

impl OrderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new order. The id must not exist yet.
    pub fn insert(&mut self, order: Order) -> Result<OrderId, StoreError> {
        let id = order.id;
        if self.orders.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        self.orders.insert(id, order);
        self.sequence.push(id);
        Ok(id)
    }

    /// Get an order by ID.
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// Move an order to `status`.
    ///
    /// Terminal orders never change: returns `Ok(false)` and leaves them as
    /// they are. Setting `Filled` here marks the full quantity filled but
    /// records no price; fills normally go through [`record_fill`](Self::record_fill).
    pub fn set_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool, StoreError> {
        let order = self.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.is_terminal() {
            return Ok(false);
        }
        if status == OrderStatus::Filled {
            order.filled_quantity = order.quantity;
        }
        order.status = status;
        Ok(true)
    }

    /// Record a whole fill at `price`. Returns `Ok(false)` if the order was already terminal.
    pub fn record_fill(&mut self, id: OrderId, price: Price) -> Result<bool, StoreError> {
        let order = self.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.is_terminal() {
            return Ok(false);
        }
        order.fill(price);
        Ok(true)
    }

    /// Replace the stop price of an order.
    pub fn mutate_stop_price(&mut self, id: OrderId, price: Price) -> Result<(), StoreError> {
        let order = self.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.stop_price = Some(price);
        Ok(())
    }

    /// Pending orders for `symbol`, in insertion order.
    pub fn all_pending_for_symbol(&self, symbol: Symbol) -> impl Iterator<Item = &Order> + '_ {
        self.iter()
            .filter(move |o| o.symbol == symbol && o.is_active())
    }

    /// All orders in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.sequence.iter().filter_map(|id| self.orders.get(id))
    }

    /// Number of stored orders (any status).
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if the store holds no orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Drop terminal orders accepted by `evict`. Returns the removed ids.
    pub fn evict_terminal(&mut self, mut evict: impl FnMut(&Order) -> bool) -> Vec<OrderId> {
        let mut removed = Vec::new();
        self.orders.retain(|id, order| {
            let drop = order.is_terminal() && evict(order);
            if drop {
                removed.push(*id);
            }
            !drop
        });
        if !removed.is_empty() {
            self.sequence.retain(|id| self.orders.contains_key(id));
        }
        removed
    }
}
