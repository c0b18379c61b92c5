//! OrderEngine: the public entry point.
//!
//! The engine owns one [`SymbolBook`] per symbol and routes every call to the
//! book that owns the order or group. Calls take `&mut self`, so all
//! operations on one engine are serialized; [`OrderEngine::submit_price_ticks`]
//! can run different symbols concurrently with the `parallel` feature.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{InvariantViolation, StoreError};
use crate::journal::Command;
use crate::{
    BracketGroup, BracketHandle, BracketId, BracketRequest, Clock, EngineConfig, Event,
    IdGenerator, OcoGroup, OcoHandle, OcoId, OcoRequest, Order, OrderId, PortfolioSummary, Price,
    SequentialIds, Side, SideCounts, Symbol, SymbolBook, SystemClock, Timestamp, TrailingRequest,
    TrailingStop, ValidationError,
};

/// Log and abort. Internal state is corrupt past this point.
#[track_caller]
fn fatal<T>(err: InvariantViolation) -> T {
    log::error!("invariant violation: {err}");
    panic!("order engine invariant violated: {err}");
}

fn validate_tick(symbol: Symbol, price: Price) -> Result<(), ValidationError> {
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    if !price.is_positive() {
        return Err(ValidationError::NonPositivePrice("tick price"));
    }
    Ok(())
}

/// Order lifecycle engine for bracket, OCO and trailing-stop orders.
///
/// ```
/// use bracketbook::{BracketRequest, OrderEngine, OrderStatus, Price, Side, Symbol};
///
/// let mut engine = OrderEngine::new();
/// let eurusd = Symbol::new("EURUSD");
///
/// let handle = engine
///     .create_bracket_order(BracketRequest::new(
///         eurusd, Side::Buy, Price(1_0850), 1000, Price(1_0800), Price(1_0950),
///     ))
///     .unwrap();
///
/// let events = engine.submit_price_tick(eurusd, Price(1_0850)).unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(engine.get_order(handle.entry_order_id).unwrap().status, OrderStatus::Filled);
/// ```
pub struct OrderEngine {
    config: EngineConfig,
    books: FxHashMap<Symbol, SymbolBook>,
    /// Which book owns each order
    routes: FxHashMap<OrderId, Symbol>,
    bracket_routes: FxHashMap<BracketId, Symbol>,
    oco_routes: FxHashMap<OcoId, Symbol>,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    #[cfg(feature = "event-log")]
    journal: Vec<Command>,
}

impl OrderEngine {
    /// Engine with default policy, sequential ids and the system clock.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_parts(config, Box::new(SequentialIds::new()), Box::new(SystemClock))
    }

    /// Engine with injected id generation and time.
    pub fn with_parts(
        config: EngineConfig,
        ids: Box<dyn IdGenerator>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            config,
            books: FxHashMap::default(),
            routes: FxHashMap::default(),
            bracket_routes: FxHashMap::default(),
            oco_routes: FxHashMap::default(),
            ids,
            clock,
            #[cfg(feature = "event-log")]
            journal: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // === Creation ===

    /// Create a bracket: entry, stop-loss and take-profit.
    ///
    /// Validation happens before anything is registered; on error no order
    /// exists and no id has been consumed.
    pub fn create_bracket_order(
        &mut self,
        request: BracketRequest,
    ) -> Result<BracketHandle, ValidationError> {
        let now = self.clock.now();
        self.create_bracket_at(request, now)
    }

    pub(crate) fn create_bracket_at(
        &mut self,
        request: BracketRequest,
        now: Timestamp,
    ) -> Result<BracketHandle, ValidationError> {
        self.record(|| Command::CreateBracket {
            at: now,
            request: request.clone(),
        });
        if let Err(err) = request.validate(now) {
            log::warn!("bracket on {} rejected: {err}", request.symbol);
            return Err(err);
        }

        let bracket_id = BracketId(self.ids.next_id());
        let ids = [
            self.next_order_id(),
            self.next_order_id(),
            self.next_order_id(),
        ];
        let symbol = request.symbol;
        let handle = self
            .book_mut(symbol)
            .add_bracket(bracket_id, ids, &request, now)
            .unwrap_or_else(fatal);

        for id in ids {
            self.routes.insert(id, symbol);
        }
        self.bracket_routes.insert(bracket_id, symbol);
        log::debug!(
            "bracket {bracket_id} on {symbol}: entry {} stop {} target {}",
            handle.entry_order_id,
            handle.stop_order_id,
            handle.take_profit_order_id
        );
        Ok(handle)
    }

    /// Create a one-cancels-other group with one order per leg.
    pub fn create_oco_order(&mut self, request: OcoRequest) -> Result<OcoHandle, ValidationError> {
        let now = self.clock.now();
        self.create_oco_at(request, now)
    }

    pub(crate) fn create_oco_at(
        &mut self,
        request: OcoRequest,
        now: Timestamp,
    ) -> Result<OcoHandle, ValidationError> {
        self.record(|| Command::CreateOco {
            at: now,
            request: request.clone(),
        });
        if let Err(err) = request.validate(now) {
            log::warn!("oco on {} rejected: {err}", request.symbol);
            return Err(err);
        }

        let oco_id = OcoId(self.ids.next_id());
        let ids: Vec<OrderId> = (0..request.legs.len())
            .map(|_| self.next_order_id())
            .collect();
        let symbol = request.symbol;
        let handle = self
            .book_mut(symbol)
            .add_oco(oco_id, &ids, &request, now)
            .unwrap_or_else(fatal);

        for id in &ids {
            self.routes.insert(*id, symbol);
        }
        self.oco_routes.insert(oco_id, symbol);
        log::debug!("oco {oco_id} on {symbol}: {} legs", ids.len());
        Ok(handle)
    }

    /// Create a standalone trailing stop. Returns the id of the stop order it drives.
    pub fn create_trailing_stop(
        &mut self,
        request: TrailingRequest,
    ) -> Result<OrderId, ValidationError> {
        let now = self.clock.now();
        self.create_trailing_at(request, now)
    }

    pub(crate) fn create_trailing_at(
        &mut self,
        request: TrailingRequest,
        now: Timestamp,
    ) -> Result<OrderId, ValidationError> {
        self.record(|| Command::CreateTrailing {
            at: now,
            request: request.clone(),
        });
        if let Err(err) = request.validate(now) {
            log::warn!("trailing stop on {} rejected: {err}", request.symbol);
            return Err(err);
        }

        let order_id = self.next_order_id();
        let symbol = request.symbol;
        self.book_mut(symbol)
            .add_trailing(order_id, &request, now)
            .unwrap_or_else(fatal);
        self.routes.insert(order_id, symbol);
        log::debug!("trailing stop {order_id} on {symbol} ({:?})", request.trail);
        Ok(order_id)
    }

    fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.ids.next_id());
        if self.routes.contains_key(&id) {
            fatal::<()>(StoreError::DuplicateId(id).into());
        }
        id
    }

    fn book_mut(&mut self, symbol: Symbol) -> &mut SymbolBook {
        self.books
            .entry(symbol)
            .or_insert_with(|| SymbolBook::new(symbol))
    }

    // === Ticks ===

    /// Process one price tick for `symbol`.
    ///
    /// Returns the events of this tick in the order they happened. Feeding
    /// the same price twice is safe.
    pub fn submit_price_tick(
        &mut self,
        symbol: Symbol,
        price: Price,
    ) -> Result<Vec<Event>, ValidationError> {
        let now = self.clock.now();
        self.submit_price_tick_at(symbol, price, now)
    }

    pub(crate) fn submit_price_tick_at(
        &mut self,
        symbol: Symbol,
        price: Price,
        now: Timestamp,
    ) -> Result<Vec<Event>, ValidationError> {
        self.record(|| Command::PriceTick {
            at: now,
            symbol,
            price,
        });
        validate_tick(symbol, price)?;
        let config = self.config;
        Ok(self
            .book_mut(symbol)
            .on_tick(price, now, &config)
            .unwrap_or_else(fatal))
    }

    /// Process a batch of ticks.
    ///
    /// Ticks of one symbol are applied in the order given; different symbols
    /// are independent and run on the rayon pool with the `parallel` feature.
    /// Events are grouped per symbol, in order of each symbol's first
    /// appearance in `ticks`. The whole batch is rejected if any tick is invalid.
    pub fn submit_price_ticks(
        &mut self,
        ticks: &[(Symbol, Price)],
    ) -> Result<Vec<Event>, ValidationError> {
        for &(symbol, price) in ticks {
            validate_tick(symbol, price)?;
        }
        let now = self.clock.now();

        let mut slots: FxHashMap<Symbol, usize> = FxHashMap::default();
        let mut shards: Vec<(SymbolBook, Vec<Price>)> = Vec::new();
        for &(symbol, price) in ticks {
            self.record(|| Command::PriceTick {
                at: now,
                symbol,
                price,
            });
            let slot = *slots.entry(symbol).or_insert_with(|| {
                let book = self
                    .books
                    .remove(&symbol)
                    .unwrap_or_else(|| SymbolBook::new(symbol));
                shards.push((book, Vec::new()));
                shards.len() - 1
            });
            shards[slot].1.push(price);
        }

        let config = self.config;
        let run = |(book, prices): &mut (SymbolBook, Vec<Price>)| {
            let mut events = Vec::new();
            for &price in prices.iter() {
                events.extend(book.on_tick(price, now, &config)?);
            }
            Ok::<_, InvariantViolation>(events)
        };

        #[cfg(feature = "parallel")]
        let results: Vec<_> = {
            use rayon::prelude::*;
            shards.par_iter_mut().map(run).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = shards.iter_mut().map(run).collect();

        let mut events = Vec::new();
        for ((book, _), result) in shards.into_iter().zip(results) {
            self.books.insert(book.symbol(), book);
            events.extend(result.unwrap_or_else(fatal));
        }
        Ok(events)
    }

    // === Cancellation ===

    /// Cancel an order and cascade to its group.
    ///
    /// Returns `false` if the id is unknown or the order is already terminal
    /// (a fill applied before the cancel wins).
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let now = self.clock.now();
        self.cancel_order_at(order_id, now)
    }

    pub(crate) fn cancel_order_at(&mut self, order_id: OrderId, now: Timestamp) -> bool {
        self.record(|| Command::Cancel { at: now, order_id });
        let Some(book) = self
            .routes
            .get(&order_id)
            .and_then(|symbol| self.books.get_mut(symbol))
        else {
            return false;
        };
        let cancelled = book.cancel(order_id).unwrap_or_else(fatal);
        if cancelled {
            log::debug!("order {order_id} cancelled");
        }
        cancelled
    }

    /// Cancel every pending leg of a bracket and close it.
    pub fn cancel_bracket(&mut self, bracket_id: BracketId) -> bool {
        let now = self.clock.now();
        self.cancel_bracket_at(bracket_id, now)
    }

    pub(crate) fn cancel_bracket_at(&mut self, bracket_id: BracketId, now: Timestamp) -> bool {
        self.record(|| Command::CancelBracket {
            at: now,
            bracket_id,
        });
        match self
            .bracket_routes
            .get(&bracket_id)
            .and_then(|symbol| self.books.get_mut(symbol))
        {
            Some(book) => book.cancel_bracket(bracket_id).unwrap_or_else(fatal),
            None => false,
        }
    }

    /// Cancel every pending member of an OCO group.
    pub fn cancel_oco(&mut self, oco_id: OcoId) -> bool {
        let now = self.clock.now();
        self.cancel_oco_at(oco_id, now)
    }

    pub(crate) fn cancel_oco_at(&mut self, oco_id: OcoId, now: Timestamp) -> bool {
        self.record(|| Command::CancelOco { at: now, oco_id });
        match self
            .oco_routes
            .get(&oco_id)
            .and_then(|symbol| self.books.get_mut(symbol))
        {
            Some(book) => book.cancel_oco(oco_id).unwrap_or_else(fatal),
            None => false,
        }
    }

    // === Queries ===

    /// Get an order by ID, including terminal ones not yet cleared.
    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        let symbol = self.routes.get(&order_id)?;
        self.books.get(symbol)?.store().get(order_id)
    }

    /// Active orders, optionally for one symbol. Sorted by symbol, then by
    /// creation order.
    pub fn list_active_orders(&self, symbol: Option<Symbol>) -> Vec<&Order> {
        let mut books: Vec<&SymbolBook> = match symbol {
            Some(symbol) => self.books.get(&symbol).into_iter().collect(),
            None => self.books.values().collect(),
        };
        books.sort_by_key(|book| book.symbol());
        books
            .into_iter()
            .flat_map(|book| book.store().iter().filter(|o| o.is_active()))
            .collect()
    }

    pub fn get_bracket(&self, bracket_id: BracketId) -> Option<&BracketGroup> {
        let symbol = self.bracket_routes.get(&bracket_id)?;
        self.books.get(symbol)?.brackets().get(bracket_id)
    }

    pub fn get_oco(&self, oco_id: OcoId) -> Option<&OcoGroup> {
        let symbol = self.oco_routes.get(&oco_id)?;
        self.books.get(symbol)?.ocos().get(oco_id)
    }

    /// The trailing stop driving `order_id`, if any.
    pub fn get_trailing_stop(&self, order_id: OrderId) -> Option<&TrailingStop> {
        let symbol = self.routes.get(&order_id)?;
        self.books.get(symbol)?.trailing().get(order_id)
    }

    /// Price of the last tick seen for `symbol`.
    pub fn last_price(&self, symbol: Symbol) -> Option<Price> {
        self.books.get(&symbol)?.last_price()
    }

    /// Symbols the engine has seen, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.books.keys().copied().collect();
        symbols.sort();
        symbols
    }

    /// Counts of live orders and groups.
    pub fn portfolio_summary(&self) -> PortfolioSummary {
        let mut summary = PortfolioSummary::default();
        for book in self.books.values() {
            summary.bracket_orders += book.brackets().open_count();
            summary.oco_orders += book.ocos().open_count();
            summary.trailing_stops += book.trailing().live_count();
            for order in book.store().iter().filter(|o| o.is_active()) {
                summary.active_orders += 1;
                let counts: &mut SideCounts = summary.by_symbol.entry(order.symbol).or_default();
                match order.side {
                    Side::Buy => counts.buy += 1,
                    Side::Sell => counts.sell += 1,
                }
            }
        }
        summary
    }

    // === Memory management ===

    /// Remove terminal orders whose group is resolved, resolved groups and
    /// finished trailing stops. Returns the number of orders removed.
    ///
    /// Use periodically for long-running instances. Removed orders are no
    /// longer returned by [`get_order`](Self::get_order).
    pub fn clear_history(&mut self) -> usize {
        let mut removed = 0;
        for book in self.books.values_mut() {
            for id in book.clear_history() {
                self.routes.remove(&id);
                removed += 1;
            }
        }
        let books = &self.books;
        self.bracket_routes.retain(|id, symbol| {
            books
                .get(symbol)
                .is_some_and(|b| b.brackets().get(*id).is_some())
        });
        self.oco_routes.retain(|id, symbol| {
            books
                .get(symbol)
                .is_some_and(|b| b.ocos().get(*id).is_some())
        });
        log::debug!("cleared {removed} orders from history");
        removed
    }

    // === Journal ===

    #[cfg(feature = "event-log")]
    fn record(&mut self, command: impl FnOnce() -> Command) {
        self.journal.push(command());
    }

    #[cfg(not(feature = "event-log"))]
    fn record<C>(&mut self, _command: impl FnOnce() -> C) {}

    /// Every command applied so far, in order.
    #[cfg(feature = "event-log")]
    pub fn commands(&self) -> &[Command] {
        &self.journal
    }

    /// Forget the recorded commands. State is kept.
    #[cfg(feature = "event-log")]
    pub fn clear_commands(&mut self) {
        self.journal.clear();
    }
}

impl Default for OrderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderEngine")
            .field("config", &self.config)
            .field("symbols", &self.symbols())
            .field("orders", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, OcoLeg, OrderStatus};

    fn engine() -> (OrderEngine, ManualClock) {
        let clock = ManualClock::new(1_000);
        let engine = OrderEngine::with_parts(
            EngineConfig::default(),
            Box::new(SequentialIds::new()),
            Box::new(clock.clone()),
        );
        (engine, clock)
    }

    fn eurusd() -> Symbol {
        Symbol::new("EURUSD")
    }

    fn bracket() -> BracketRequest {
        BracketRequest::new(eurusd(), Side::Buy, Price(1_0850), 1000, Price(1_0800), Price(1_0950))
    }

    #[test]
    fn ids_are_sequential_and_deterministic() {
        let (mut engine, _) = engine();
        let handle = engine.create_bracket_order(bracket()).unwrap();
        assert_eq!(handle.bracket_id, BracketId(1));
        assert_eq!(handle.entry_order_id, OrderId(2));
        assert_eq!(handle.stop_order_id, OrderId(3));
        assert_eq!(handle.take_profit_order_id, OrderId(4));
    }

    #[test]
    fn rejected_request_consumes_no_ids() {
        let (mut engine, _) = engine();
        let mut bad = bracket();
        bad.stop_loss = Price(1_0900);
        assert_eq!(
            engine.create_bracket_order(bad),
            Err(ValidationError::StopLossNotBelowEntry)
        );
        assert!(engine.list_active_orders(None).is_empty());

        let handle = engine.create_bracket_order(bracket()).unwrap();
        assert_eq!(handle.bracket_id, BracketId(1));
    }

    #[test]
    fn invalid_tick_is_rejected() {
        let (mut engine, _) = engine();
        assert_eq!(
            engine.submit_price_tick(eurusd(), Price(0)),
            Err(ValidationError::NonPositivePrice("tick price"))
        );
        assert_eq!(
            engine.submit_price_tick(Symbol::new(""), Price(1)),
            Err(ValidationError::EmptySymbol)
        );
    }

    #[test]
    fn ticks_are_routed_by_symbol() {
        let (mut engine, _) = engine();
        let handle = engine.create_bracket_order(bracket()).unwrap();

        let events = engine
            .submit_price_tick(Symbol::new("GBPUSD"), Price(1_0000))
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(
            engine.get_order(handle.entry_order_id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn clock_drives_expiry() {
        let (mut engine, clock) = engine();
        let handle = engine
            .create_bracket_order(bracket().with_expiry(2_000))
            .unwrap();

        clock.set(1_999);
        assert!(engine.submit_price_tick(eurusd(), Price(1_0900)).unwrap().is_empty());
        clock.set(2_000);
        let events = engine.submit_price_tick(eurusd(), Price(1_0900)).unwrap();
        assert_eq!(
            events,
            vec![Event::OrderExpired { order_id: handle.entry_order_id, symbol: eurusd() }]
        );
        assert_eq!(
            engine.get_bracket(handle.bracket_id).unwrap().status,
            crate::BracketStatus::Closed
        );
    }

    #[test]
    fn batch_groups_events_by_symbol() {
        let (mut engine, _) = engine();
        let gbp = Symbol::new("GBPUSD");
        let bracket_handle = engine.create_bracket_order(bracket()).unwrap();
        let oco = engine
            .create_oco_order(OcoRequest::new(
                gbp,
                500,
                vec![OcoLeg::limit(Side::Sell, Price(1_2750)), OcoLeg::stop(Side::Sell, Price(1_2650))],
            ))
            .unwrap();

        let events = engine
            .submit_price_ticks(&[
                (gbp, Price(1_2700)),
                (eurusd(), Price(1_0850)),
                (gbp, Price(1_2750)),
                (eurusd(), Price(1_0960)),
            ])
            .unwrap();

        let ids: Vec<OrderId> = events.iter().map(Event::order_id).collect();
        assert_eq!(
            ids,
            vec![
                oco.order_ids[0],
                bracket_handle.entry_order_id,
                bracket_handle.take_profit_order_id,
            ]
        );
        assert_eq!(engine.last_price(gbp), Some(Price(1_2750)));
    }

    #[test]
    fn batch_with_invalid_tick_changes_nothing() {
        let (mut engine, _) = engine();
        let handle = engine.create_bracket_order(bracket()).unwrap();
        let result = engine.submit_price_ticks(&[(eurusd(), Price(1_0850)), (eurusd(), Price(-1))]);
        assert!(result.is_err());
        assert_eq!(
            engine.get_order(handle.entry_order_id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn cancel_unknown_is_false() {
        let (mut engine, _) = engine();
        assert!(!engine.cancel_order(OrderId(77)));
        assert!(!engine.cancel_bracket(BracketId(77)));
        assert!(!engine.cancel_oco(OcoId(77)));
        assert!(engine.get_order(OrderId(77)).is_none());
    }

    #[test]
    fn summary_counts() {
        let (mut engine, _) = engine();
        engine.create_bracket_order(bracket()).unwrap();
        engine
            .create_trailing_stop(TrailingRequest::new(Symbol::new("BTC"), Side::Sell, 10, 500))
            .unwrap();

        let summary = engine.portfolio_summary();
        assert_eq!(summary.active_orders, 4);
        assert_eq!(summary.bracket_orders, 1);
        assert_eq!(summary.oco_orders, 0);
        assert_eq!(summary.trailing_stops, 1);
        assert_eq!(summary.by_symbol[&eurusd()], SideCounts { buy: 1, sell: 2 });
        assert_eq!(summary.by_symbol[&Symbol::new("BTC")], SideCounts { buy: 0, sell: 1 });
    }

    #[test]
    fn clear_history_drops_routes() {
        let (mut engine, _) = engine();
        let handle = engine.create_bracket_order(bracket()).unwrap();
        assert!(engine.cancel_bracket(handle.bracket_id));
        assert_eq!(engine.clear_history(), 3);
        assert!(engine.get_order(handle.entry_order_id).is_none());
        assert!(engine.get_bracket(handle.bracket_id).is_none());
        assert!(!engine.cancel_order(handle.entry_order_id));
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn duplicate_ids_are_fatal() {
        struct Stuck;
        impl IdGenerator for Stuck {
            fn next_id(&mut self) -> u64 {
                7
            }
        }
        let mut engine = OrderEngine::with_parts(
            EngineConfig::default(),
            Box::new(Stuck),
            Box::new(ManualClock::new(0)),
        );
        let _ = engine.create_bracket_order(bracket());
    }
}
