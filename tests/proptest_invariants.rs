// Allow our fixed-point digit grouping convention (e.g., 1_0850 = 1.0850)
#![allow(clippy::inconsistent_digit_grouping)]

//! Property-based tests for order lifecycle invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated requests and price paths.

use bracketbook::{
    BracketRequest, BracketStatus, EngineConfig, Event, ManualClock, OcoLeg, OcoRequest,
    OcoStatus, OrderEngine, OrderId, OrderStatus, Price, SequentialIds, Side, Symbol,
    TrailingRequest,
};
use proptest::prelude::*;

fn sym() -> Symbol {
    Symbol::new("EURUSD")
}

fn engine() -> OrderEngine {
    OrderEngine::with_parts(
        EngineConfig::default(),
        Box::new(SequentialIds::new()),
        Box::new(ManualClock::new(0)),
    )
}

/// Generate a valid price (positive, reasonable range)
fn price_strategy() -> impl Strategy<Value = Price> {
    (1i64..=100_000i64).prop_map(Price)
}

/// Generate any price, including invalid ones
fn raw_price_strategy() -> impl Strategy<Value = Price> {
    (-100i64..=100_000i64).prop_map(Price)
}

/// Generate a side
fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

/// Generate a price path around a center
fn path_strategy(center: i64, spread: i64) -> impl Strategy<Value = Vec<Price>> {
    prop::collection::vec((center - spread)..=(center + spread), 1..60)
        .prop_map(|v| v.into_iter().map(Price).collect())
}

/// Generate a well-formed bracket around 10_000
fn bracket_strategy() -> impl Strategy<Value = BracketRequest> {
    (side_strategy(), 1i64..=2_000, 1i64..=2_000, 1u64..=1_000).prop_map(|(side, sl, tp, qty)| {
        let entry = 10_000;
        let (stop_loss, take_profit) = match side {
            Side::Buy => (entry - sl, entry + tp),
            Side::Sell => (entry + sl, entry - tp),
        };
        BracketRequest::new(sym(), side, Price(entry), qty, Price(stop_loss), Price(take_profit))
    })
}

/// Generate an OCO leg priced around 10_000
fn leg_strategy() -> impl Strategy<Value = OcoLeg> {
    (side_strategy(), 0u8..4, 8_000i64..=12_000, 0i64..=500).prop_map(|(side, kind, p, off)| {
        match kind {
            0 => OcoLeg::market(side),
            1 => OcoLeg::limit(side, Price(p)),
            2 => OcoLeg::stop(side, Price(p)),
            _ => OcoLeg::stop_limit(side, Price(p), Price(p + off)),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // ========================================================================
    // ATOMIC CREATION
    // ========================================================================

    /// A bracket request creates three orders or none
    #[test]
    fn bracket_creation_is_atomic(
        side in side_strategy(),
        entry in raw_price_strategy(),
        stop_loss in raw_price_strategy(),
        take_profit in raw_price_strategy(),
        qty in 0u64..=10,
    ) {
        let mut engine = engine();
        let request = BracketRequest::new(sym(), side, entry, qty, stop_loss, take_profit);
        let expected = request.validate(0);

        match engine.create_bracket_order(request) {
            Ok(h) => {
                prop_assert!(expected.is_ok());
                prop_assert_eq!(engine.list_active_orders(None).len(), 3);
                prop_assert_eq!(engine.get_bracket(h.bracket_id).unwrap().status, BracketStatus::Pending);
            }
            Err(e) => {
                prop_assert_eq!(expected.err(), Some(e));
                prop_assert!(engine.list_active_orders(None).is_empty());
                prop_assert_eq!(engine.portfolio_summary().bracket_orders, 0);
            }
        }
    }

    // ========================================================================
    // EXCLUSIVITY
    // ========================================================================

    /// At most one bracket exit fills, never before the entry
    #[test]
    fn bracket_exits_are_exclusive(
        request in bracket_strategy(),
        path in path_strategy(10_000, 2_500),
    ) {
        let mut engine = engine();
        let h = engine.create_bracket_order(request).unwrap();
        let mut entry_seen = false;

        for price in path {
            for event in engine.submit_price_tick(sym(), price).unwrap() {
                if event.order_id() == h.entry_order_id {
                    entry_seen = true;
                } else {
                    prop_assert!(entry_seen, "exit {} filled before entry", event.order_id());
                }
            }
        }

        let sl = engine.get_order(h.stop_order_id).unwrap().status;
        let tp = engine.get_order(h.take_profit_order_id).unwrap().status;
        prop_assert!(!(sl == OrderStatus::Filled && tp == OrderStatus::Filled));
        if sl == OrderStatus::Filled || tp == OrderStatus::Filled {
            prop_assert!(sl == OrderStatus::Cancelled || tp == OrderStatus::Cancelled);
            prop_assert_eq!(engine.get_bracket(h.bracket_id).unwrap().status, BracketStatus::Closed);
        }
    }

    /// At most one OCO member fills; the rest end cancelled
    #[test]
    fn oco_members_are_exclusive(
        legs in prop::collection::vec(leg_strategy(), 2..5),
        path in path_strategy(10_000, 3_000),
    ) {
        let mut engine = engine();
        let h = engine.create_oco_order(OcoRequest::new(sym(), 5, legs)).unwrap();

        let mut fills = 0;
        for price in path {
            fills += engine
                .submit_price_tick(sym(), price)
                .unwrap()
                .iter()
                .filter(|e| e.is_fill())
                .count();
        }
        prop_assert!(fills <= 1);

        let statuses: Vec<OrderStatus> = h
            .order_ids
            .iter()
            .map(|id| engine.get_order(*id).unwrap().status)
            .collect();
        let filled = statuses.iter().filter(|s| **s == OrderStatus::Filled).count();
        prop_assert_eq!(filled, fills);
        if filled == 1 {
            prop_assert!(statuses.iter().all(|s| s.is_terminal()));
            prop_assert_eq!(engine.get_oco(h.oco_id).unwrap().status, OcoStatus::Closed);
        }
    }

    // ========================================================================
    // TRAILING STOPS
    // ========================================================================

    /// The stop level only moves in the position's favor
    #[test]
    fn trailing_stop_is_monotonic(
        side in side_strategy(),
        distance in 1i64..=1_000,
        path in path_strategy(10_000, 2_000),
    ) {
        let mut engine = engine();
        let id = engine
            .create_trailing_stop(TrailingRequest::new(sym(), side, 1, distance))
            .unwrap();

        let mut last: Option<Price> = None;
        for price in path {
            let events = engine.submit_price_tick(sym(), price).unwrap();
            let stop = engine.get_order(id).unwrap().stop_price;
            if let (Some(prev), Some(now)) = (last, stop) {
                match side {
                    Side::Sell => prop_assert!(now >= prev),
                    Side::Buy => prop_assert!(now <= prev),
                }
            }
            last = stop;

            if let Some(Event::TrailingStopTriggered { stop_price, price: tick, .. }) = events.first() {
                prop_assert!(side.stop_crossed(*tick, *stop_price));
                break;
            }
        }
    }

    /// A sell stop never sits above its watermark, a buy stop never below
    #[test]
    fn trailing_stop_trails_watermark(
        side in side_strategy(),
        distance in 1i64..=1_000,
        path in path_strategy(10_000, 2_000),
    ) {
        let mut engine = engine();
        let id = engine
            .create_trailing_stop(TrailingRequest::new(sym(), side, 1, distance))
            .unwrap();
        for price in path {
            engine.submit_price_tick(sym(), price).unwrap();
        }
        let stop = engine.get_trailing_stop(id).unwrap();
        if let (Some(watermark), Some(level)) = (stop.watermark, stop.current_stop_price) {
            match side {
                Side::Sell => prop_assert_eq!(level.0, watermark.0 - distance),
                Side::Buy => prop_assert_eq!(level.0, watermark.0 + distance),
            }
        }
    }

    // ========================================================================
    // CANCELLATION
    // ========================================================================

    /// Cancelling twice changes nothing the second time
    #[test]
    fn cancel_is_idempotent(
        request in bracket_strategy(),
        path in path_strategy(10_000, 2_500),
        pick in 0usize..3,
    ) {
        let mut engine = engine();
        let h = engine.create_bracket_order(request).unwrap();
        for price in path {
            engine.submit_price_tick(sym(), price).unwrap();
        }
        let id = [h.entry_order_id, h.stop_order_id, h.take_profit_order_id][pick];

        let was_active = engine.get_order(id).unwrap().is_active();
        prop_assert_eq!(engine.cancel_order(id), was_active);
        let summary = engine.portfolio_summary();
        prop_assert!(!engine.cancel_order(id));
        prop_assert_eq!(engine.portfolio_summary(), summary);
        if was_active {
            prop_assert_eq!(engine.get_bracket(h.bracket_id).unwrap().status, BracketStatus::Closed);
        }
    }

    // ========================================================================
    // DETERMINISM
    // ========================================================================

    /// Batched ticks end in the same state as one-by-one ticks
    #[test]
    fn batch_matches_sequential(
        request in bracket_strategy(),
        path in path_strategy(10_000, 2_500),
        btc_path in prop::collection::vec(price_strategy(), 1..30),
    ) {
        let btc = Symbol::new("BTC");
        let setup = |engine: &mut OrderEngine| {
            engine.create_bracket_order(request.clone()).unwrap();
            engine.create_trailing_stop(TrailingRequest::new(btc, Side::Sell, 1, 250)).unwrap();
        };

        let mut ticks: Vec<(Symbol, Price)> = Vec::new();
        for i in 0..path.len().max(btc_path.len()) {
            if let Some(p) = path.get(i) {
                ticks.push((sym(), *p));
            }
            if let Some(p) = btc_path.get(i) {
                ticks.push((btc, *p));
            }
        }

        let mut one_by_one = engine();
        setup(&mut one_by_one);
        let mut sequential_events = 0;
        for &(symbol, price) in &ticks {
            sequential_events += one_by_one.submit_price_tick(symbol, price).unwrap().len();
        }

        let mut batched = engine();
        setup(&mut batched);
        let batch_events = batched.submit_price_ticks(&ticks).unwrap();

        prop_assert_eq!(batch_events.len(), sequential_events);
        for id in 1..=5 {
            prop_assert_eq!(batched.get_order(OrderId(id)), one_by_one.get_order(OrderId(id)));
        }
    }

    /// Replaying the journal rebuilds the same orders
    #[cfg(feature = "event-log")]
    #[test]
    fn replay_is_deterministic(
        request in bracket_strategy(),
        legs in prop::collection::vec(leg_strategy(), 2..4),
        path in path_strategy(10_000, 2_500),
    ) {
        let mut live = engine();
        live.create_bracket_order(request).unwrap();
        live.create_oco_order(OcoRequest::new(sym(), 3, legs)).unwrap();
        for price in path {
            live.submit_price_tick(sym(), price).unwrap();
        }

        let replayed = OrderEngine::replay(live.commands());
        prop_assert_eq!(replayed.portfolio_summary(), live.portfolio_summary());
        for order in live.list_active_orders(None) {
            prop_assert_eq!(replayed.get_order(order.id), Some(order));
        }
    }
}
