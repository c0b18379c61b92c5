//! SymbolBook: everything the engine tracks for one symbol.
//!
//! A book owns its own [`OrderStore`] shard plus the bracket, OCO and
//! trailing-stop state of that symbol. All of a tick's work happens inside
//! one book, so books of different symbols never touch shared state.
//!
//! Tick pipeline, in order:
//! 1. expiry: due orders become `Expired` and cascade like a cancel;
//! 2. trailing stops: levels move, triggered stops fill their order;
//! 3. fill evaluation: pending orders in insertion order;
//! 4. cascades run immediately after each fill, so a sibling cancelled
//!    by an earlier fill is never evaluated later in the same tick.

use crate::error::{InvariantViolation, StoreError};
use crate::{
    BracketCoordinator, BracketHandle, BracketId, BracketRequest, BracketRole, BracketStatus,
    EngineConfig, Event, GroupRef, OcoCoordinator, OcoHandle, OcoId, OcoRequest, OcoStatus, Order,
    OrderId, OrderStatus, OrderStore, Price, Symbol, TieBreak, Timestamp, TrailMethod,
    TrailingOutcome, TrailingRequest, TrailingStopEngine, fill,
};

/// How an order left the book, as seen by its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolution {
    Filled,
    Cancelled,
}

/// Per-symbol shard.
#[derive(Clone, Debug)]
pub struct SymbolBook {
    symbol: Symbol,
    store: OrderStore,
    brackets: BracketCoordinator,
    ocos: OcoCoordinator,
    trailing: TrailingStopEngine,
    last_price: Option<Price>,
}

impl SymbolBook {
    /// Create an empty book.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            store: OrderStore::new(),
            brackets: BracketCoordinator::new(),
            ocos: OcoCoordinator::new(),
            trailing: TrailingStopEngine::new(),
            last_price: None,
        }
    }

    // === Accessors ===

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn brackets(&self) -> &BracketCoordinator {
        &self.brackets
    }

    pub fn ocos(&self) -> &OcoCoordinator {
        &self.ocos
    }

    pub fn trailing(&self) -> &TrailingStopEngine {
        &self.trailing
    }

    /// Price of the most recent tick, if any.
    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    // === Creation ===

    pub(crate) fn add_bracket(
        &mut self,
        bracket_id: BracketId,
        ids: [OrderId; 3],
        request: &BracketRequest,
        now: Timestamp,
    ) -> Result<BracketHandle, InvariantViolation> {
        self.brackets
            .create(&mut self.store, bracket_id, ids, request, now)
    }

    pub(crate) fn add_oco(
        &mut self,
        oco_id: OcoId,
        ids: &[OrderId],
        request: &OcoRequest,
        now: Timestamp,
    ) -> Result<OcoHandle, InvariantViolation> {
        self.ocos.create(&mut self.store, oco_id, ids, request, now)
    }

    /// Register the stop order and the trailing stop that drives it.
    pub(crate) fn add_trailing(
        &mut self,
        order_id: OrderId,
        request: &TrailingRequest,
        now: Timestamp,
    ) -> Result<OrderId, InvariantViolation> {
        let order = Order::stop(order_id, self.symbol, request.side, None, request.quantity, now)
            .with_expiry(request.expiry);
        self.store.insert(order)?;
        self.trailing.create(
            order_id,
            self.symbol,
            request.side,
            request.trail,
            request.activation_price,
        );
        Ok(order_id)
    }

    // === Ticks ===

    /// Run one tick through the pipeline. Events are returned in the order
    /// they happened.
    pub(crate) fn on_tick(
        &mut self,
        price: Price,
        now: Timestamp,
        config: &EngineConfig,
    ) -> Result<Vec<Event>, InvariantViolation> {
        self.last_price = Some(price);
        let mut events = Vec::new();

        self.expire_due(now, &mut events)?;

        for outcome in self.trailing.on_tick(price) {
            match outcome {
                TrailingOutcome::Moved {
                    order_id,
                    stop_price,
                } => {
                    self.store.mutate_stop_price(order_id, stop_price)?;
                    log::debug!("{}: trailing stop {order_id} moved to {stop_price}", self.symbol);
                }
                TrailingOutcome::Triggered {
                    order_id,
                    stop_price,
                } => {
                    events.push(Event::TrailingStopTriggered {
                        order_id,
                        symbol: self.symbol,
                        price,
                        stop_price,
                    });
                    self.apply_fill(order_id, price, &mut events)?;
                }
            }
        }

        // Candidates are fixed before any fill: a bracket whose entry fills
        // now exposes its exits from the next tick on.
        let candidates: Vec<OrderId> = self
            .store
            .all_pending_for_symbol(self.symbol)
            .filter(|o| !self.trailing.drives(o.id))
            .filter(|o| self.eligible(o, config))
            .map(|o| o.id)
            .collect();

        for id in candidates {
            let order = self.store.get(id).ok_or(StoreError::NotFound(id))?;
            let Some(fill_price) = fill::should_fill(order, price) else {
                continue;
            };
            if self.yields_to_sibling(order, price, config) {
                continue;
            }
            self.apply_fill(id, fill_price, &mut events)?;
        }

        Ok(events)
    }

    /// Bracket exits wait for their entry unless gating is off.
    fn eligible(&self, order: &Order, config: &EngineConfig) -> bool {
        match order.group_ref {
            Some(GroupRef::Bracket { id, role }) if role != BracketRole::Entry => {
                !config.gate_exit_legs || self.brackets.exits_live(id)
            }
            _ => true,
        }
    }

    /// True if `order` is the losing bracket exit of a tie on this tick:
    /// its sibling exit fills at the same price and the tie-break favors it.
    fn yields_to_sibling(&self, order: &Order, price: Price, config: &EngineConfig) -> bool {
        let Some(GroupRef::Bracket { id, role }) = order.group_ref else {
            return false;
        };
        let preferred = match config.exit_tie_break {
            TieBreak::StopLoss => BracketRole::StopLoss,
            TieBreak::TakeProfit => BracketRole::TakeProfit,
        };
        if role == BracketRole::Entry || role == preferred {
            return false;
        }
        let Some(group) = self.brackets.get(id) else {
            return false;
        };
        let sibling = match preferred {
            BracketRole::StopLoss => group.stop_loss,
            _ => group.take_profit,
        };
        if self.trailing.drives(sibling) {
            return false;
        }
        self.store
            .get(sibling)
            .is_some_and(|s| fill::should_fill(s, price).is_some())
    }

    fn expire_due(
        &mut self,
        now: Timestamp,
        events: &mut Vec<Event>,
    ) -> Result<(), InvariantViolation> {
        let due: Vec<OrderId> = self
            .store
            .all_pending_for_symbol(self.symbol)
            .filter(|o| fill::is_expired(o, now))
            .map(|o| o.id)
            .collect();

        for id in due {
            // An earlier expiry in this pass may already have cancelled it.
            if !self.store.set_status(id, OrderStatus::Expired)? {
                continue;
            }
            log::debug!("{}: order {id} expired", self.symbol);
            events.push(Event::OrderExpired {
                order_id: id,
                symbol: self.symbol,
            });
            self.trailing.cancel(id);
            self.cancel_siblings(id, Resolution::Cancelled)?;
        }
        Ok(())
    }

    /// Fill `id` at `price`, emit the event and run the group reaction.
    fn apply_fill(
        &mut self,
        id: OrderId,
        price: Price,
        events: &mut Vec<Event>,
    ) -> Result<(), InvariantViolation> {
        if !self.store.record_fill(id, price)? {
            return Ok(());
        }
        let order = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        let (side, quantity, group) = (order.side, order.quantity, order.group_ref);
        log::debug!("{}: order {id} filled {side} {quantity} @ {price}", self.symbol);
        events.push(Event::OrderFilled {
            order_id: id,
            symbol: self.symbol,
            price,
            quantity,
            side,
        });

        match group {
            Some(GroupRef::Bracket {
                id: bracket_id,
                role: BracketRole::Entry,
            }) => self.activate_bracket(bracket_id, price),
            Some(_) => self.cancel_siblings(id, Resolution::Filled),
            None => Ok(()),
        }
    }

    /// Entry filled: open the exits and arm the trailing stop-loss if requested.
    fn activate_bracket(
        &mut self,
        bracket_id: BracketId,
        fill_price: Price,
    ) -> Result<(), InvariantViolation> {
        let group = self.brackets.on_entry_filled(bracket_id)?;
        log::info!("{}: bracket {bracket_id} active", self.symbol);
        if !group.trailing_enabled {
            return Ok(());
        }
        let (stop_id, distance) = (group.stop_loss, group.trailing_distance);
        let stop = self
            .store
            .get(stop_id)
            .ok_or(StoreError::NotFound(stop_id))?;
        if stop.is_terminal() {
            return Ok(());
        }
        self.trailing.arm(
            stop_id,
            self.symbol,
            stop.side,
            TrailMethod::Fixed(distance),
            fill_price,
            stop.stop_price,
        );
        log::debug!("{}: trailing armed on {stop_id}", self.symbol);
        Ok(())
    }

    /// Resolve the group of `id` after it filled or was cancelled.
    ///
    /// Cancelling an already-terminal sibling is a no-op. Brackets close on
    /// any resolution other than an entry fill; OCO groups close on a fill
    /// and become `Cancelled` otherwise.
    fn cancel_siblings(
        &mut self,
        id: OrderId,
        resolution: Resolution,
    ) -> Result<(), InvariantViolation> {
        let group = self.store.get(id).ok_or(StoreError::NotFound(id))?.group_ref;
        let cancelled = match group {
            None => return Ok(()),
            Some(GroupRef::Bracket { id: bracket_id, .. }) => {
                let cancelled = self.brackets.close(bracket_id, &mut self.store)?;
                log::info!("{}: bracket {bracket_id} closed by {id}", self.symbol);
                cancelled
            }
            Some(GroupRef::Oco { id: oco_id, .. }) => {
                let outcome = match resolution {
                    Resolution::Filled => OcoStatus::Closed,
                    Resolution::Cancelled => OcoStatus::Cancelled,
                };
                let cancelled = self.ocos.settle(oco_id, outcome, &mut self.store)?;
                log::info!("{}: oco {oco_id} resolved by {id} ({outcome:?})", self.symbol);
                cancelled
            }
        };
        for sibling in &cancelled {
            self.trailing.cancel(*sibling);
        }
        if !cancelled.is_empty() {
            log::debug!("{}: cascade from {id} cancelled {cancelled:?}", self.symbol);
        }
        Ok(())
    }

    // === Cancellation ===

    /// Cancel one order and cascade to its group.
    ///
    /// Returns `Ok(false)` if the order is already terminal; a fill that was
    /// applied first always wins.
    pub(crate) fn cancel(&mut self, id: OrderId) -> Result<bool, InvariantViolation> {
        if !self.store.set_status(id, OrderStatus::Cancelled)? {
            return Ok(false);
        }
        self.trailing.cancel(id);
        self.cancel_siblings(id, Resolution::Cancelled)?;
        Ok(true)
    }

    /// Close a bracket. Returns `Ok(false)` if it is unknown or already closed.
    pub(crate) fn cancel_bracket(&mut self, id: BracketId) -> Result<bool, InvariantViolation> {
        if self
            .brackets
            .get(id)
            .is_none_or(|g| g.status == BracketStatus::Closed)
        {
            return Ok(false);
        }
        for leg in self.brackets.close(id, &mut self.store)? {
            self.trailing.cancel(leg);
        }
        log::info!("{}: bracket {id} cancelled", self.symbol);
        Ok(true)
    }

    /// Cancel an OCO group. Returns `Ok(false)` if it is unknown or resolved.
    pub(crate) fn cancel_oco(&mut self, id: OcoId) -> Result<bool, InvariantViolation> {
        if self
            .ocos
            .get(id)
            .is_none_or(|g| g.status != OcoStatus::Pending)
        {
            return Ok(false);
        }
        self.ocos.settle(id, OcoStatus::Cancelled, &mut self.store)?;
        log::info!("{}: oco {id} cancelled", self.symbol);
        Ok(true)
    }

    // === Memory management ===

    /// Drop terminal orders whose group is resolved, plus resolved groups
    /// and finished trailing stops. Returns the removed order ids.
    pub(crate) fn clear_history(&mut self) -> Vec<OrderId> {
        let brackets = &self.brackets;
        let ocos = &self.ocos;
        let removed = self.store.evict_terminal(|order| match order.group_ref {
            None => true,
            Some(GroupRef::Bracket { id, .. }) => brackets
                .get(id)
                .is_none_or(|g| g.status == BracketStatus::Closed),
            Some(GroupRef::Oco { id, .. }) => {
                ocos.get(id).is_none_or(|g| g.status != OcoStatus::Pending)
            }
        });
        self.brackets.clear_history();
        self.ocos.clear_history();
        self.trailing.clear_history();
        removed
    }
}
