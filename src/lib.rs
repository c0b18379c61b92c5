// Allow our fixed-point digit grouping convention (e.g., 1_0850 = 1.0850)
#![allow(clippy::inconsistent_digit_grouping)]

//! # bracketbook
//!
//! A deterministic order lifecycle engine: bracket, one-cancels-other and
//! trailing-stop orders driven by a stream of price ticks.
//!
//! ## Features
//!
//! - **Bracket orders**: entry + stop-loss + take-profit, exits gated on the entry fill
//! - **OCO groups**: the first member to fill cancels the rest in the same tick
//! - **Trailing stops**: fixed or percentage distance, optional activation price
//! - **Cascade cancellation**: cancelling or expiring one leg resolves its group
//! - **Per-symbol shards**: symbols are independent and can be ticked in parallel
//! - **Deterministic replay**: injected ids and clock, recorded command journal
//! - **Fixed-point prices**: exact comparisons with integer ticks
//!
//! ## Quick Start
//!
//! ```
//! use bracketbook::{BracketRequest, BracketStatus, Event, OrderEngine, OrderStatus, Price, Side, Symbol};
//!
//! let mut engine = OrderEngine::new();
//! let eurusd = Symbol::new("EURUSD");
//!
//! // Buy 1000 at 1.0850, stop at 1.0800, target 1.0950
//! let bracket = engine
//!     .create_bracket_order(BracketRequest::new(
//!         eurusd, Side::Buy, Price(1_0850), 1000, Price(1_0800), Price(1_0950),
//!     ))
//!     .unwrap();
//!
//! // Entry fills; exits go live from the next tick
//! let events = engine.submit_price_tick(eurusd, Price(1_0850)).unwrap();
//! assert!(matches!(events[0], Event::OrderFilled { price: Price(1_0850), .. }));
//! assert_eq!(engine.get_bracket(bracket.bracket_id).unwrap().status, BracketStatus::Active);
//!
//! // Target reached: take-profit fills, stop-loss is cancelled
//! engine.submit_price_tick(eurusd, Price(1_0960)).unwrap();
//! assert_eq!(engine.get_order(bracket.take_profit_order_id).unwrap().status, OrderStatus::Filled);
//! assert_eq!(engine.get_order(bracket.stop_order_id).unwrap().status, OrderStatus::Cancelled);
//! ```
//!
//! ## Price Representation
//!
//! Prices are [`i64`] counts of the smallest unit; the scale is the caller's:
//!
//! ```
//! use bracketbook::Price;
//!
//! let price = Price(1_0850);  // 1.0850 with four implied decimals
//! assert_eq!(price.format_scaled(4), "1.0850");
//! ```
//!
//! ## One-Cancels-Other
//!
//! ```
//! use bracketbook::{OcoLeg, OcoRequest, OcoStatus, OrderEngine, OrderStatus, Price, Side, Symbol};
//!
//! let mut engine = OrderEngine::new();
//! let gbpusd = Symbol::new("GBPUSD");
//!
//! let oco = engine
//!     .create_oco_order(OcoRequest::new(gbpusd, 500, vec![
//!         OcoLeg::limit(Side::Sell, Price(1_2750)),
//!         OcoLeg::stop(Side::Sell, Price(1_2650)),
//!     ]))
//!     .unwrap();
//!
//! let events = engine.submit_price_tick(gbpusd, Price(1_2750)).unwrap();
//! assert_eq!(events.len(), 1);
//! assert_eq!(engine.get_order(oco.order_ids[1]).unwrap().status, OrderStatus::Cancelled);
//! assert_eq!(engine.get_oco(oco.oco_id).unwrap().status, OcoStatus::Closed);
//! ```
//!
//! ## Trailing Stops
//!
//! ```
//! use bracketbook::{Event, OrderEngine, Price, Side, Symbol, TrailingRequest};
//!
//! let mut engine = OrderEngine::new();
//! let btc = Symbol::new("BTC");
//!
//! // Protect a long: sell stop 500 below the high, armed once BTC reaches 43500
//! let stop = engine
//!     .create_trailing_stop(
//!         TrailingRequest::new(btc, Side::Sell, 1, 500).with_activation(Price(43_500)),
//!     )
//!     .unwrap();
//!
//! for price in [43_000, 43_500, 44_000, 45_000] {
//!     engine.submit_price_tick(btc, Price(price)).unwrap();
//! }
//! assert_eq!(engine.get_order(stop).unwrap().stop_price, Some(Price(44_500)));
//!
//! let events = engine.submit_price_tick(btc, Price(44_200)).unwrap();
//! assert!(matches!(events[0], Event::TrailingStopTriggered { stop_price: Price(44_500), .. }));
//! assert!(matches!(events[1], Event::OrderFilled { price: Price(44_200), .. }));
//! ```
//!
//! ## Deterministic Ids and Time
//!
//! ```
//! use bracketbook::{EngineConfig, ManualClock, OrderEngine, ScrambledIds};
//!
//! let clock = ManualClock::new(0);
//! let engine = OrderEngine::with_parts(
//!     EngineConfig::default(),
//!     Box::new(ScrambledIds::new(0x5eed)),
//!     Box::new(clock.clone()),
//! );
//! clock.advance(1_000);
//! assert_eq!(engine.now(), 1_000);
//! ```
//!
//! ## Replay
//!
//! With the `event-log` feature (default) every call is recorded and can be
//! replayed into an identical engine:
//!
//! ```
//! # #[cfg(feature = "event-log")]
//! # {
//! use bracketbook::{OrderEngine, OrderId, Price, Side, Symbol, TrailingRequest};
//!
//! let mut engine = OrderEngine::new();
//! let btc = Symbol::new("BTC");
//! engine.create_trailing_stop(TrailingRequest::new(btc, Side::Sell, 1, 500)).unwrap();
//! engine.submit_price_tick(btc, Price(44_000)).unwrap();
//!
//! let replayed = OrderEngine::replay(engine.commands());
//! assert_eq!(replayed.get_order(OrderId(1)), engine.get_order(OrderId(1)));
//! # }
//! ```

mod book;
mod bracket;
mod config;
mod engine;
mod error;
mod event;
pub mod fill;
mod ids;
pub mod journal;
mod oco;
mod order;
#[cfg(feature = "persistence")]
pub mod persistence;
mod side;
mod store;
mod summary;
mod trailing;
mod types;

// Re-export public API
pub use book::SymbolBook;
pub use bracket::{BracketCoordinator, BracketGroup, BracketHandle, BracketRequest, BracketStatus};
pub use config::{EngineConfig, TieBreak};
pub use engine::OrderEngine;
pub use error::{InvariantViolation, StoreError, ValidationError};
pub use event::Event;
pub use ids::{Clock, IdGenerator, ManualClock, ScrambledIds, SequentialIds, SystemClock};
pub use journal::{ApplyResult, Command};
pub use oco::{OcoCoordinator, OcoGroup, OcoHandle, OcoLeg, OcoRequest, OcoStatus};
pub use order::{BracketRole, GroupRef, Order, OrderKind, OrderStatus};
pub use side::Side;
pub use store::OrderStore;
pub use summary::{PortfolioSummary, SideCounts};
pub use trailing::{
    TrailMethod, TrailingOutcome, TrailingRequest, TrailingStatus, TrailingStop,
    TrailingStopEngine,
};
pub use types::{BracketId, OcoId, OrderId, Price, Quantity, Symbol, Timestamp};
