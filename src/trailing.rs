//! Trailing stops: watermark tracking and stop-level recalculation.
//!
//! A trailing stop drives one stop order in the [`OrderStore`](crate::OrderStore).
//! The engine feeds it every tick for its symbol and applies the returned
//! [`TrailingOutcome`]s: moved levels are written back to the order, triggers
//! fill it.
//!
//! Direction matters and is handled as two explicit branches:
//! - a **sell** stop protects a long: watermark is the highest price seen,
//!   stop = watermark - offset, triggers at `price <= stop`;
//! - a **buy** stop protects a short: watermark is the lowest price seen,
//!   stop = watermark + offset, triggers at `price >= stop`.
//!
//! The stop level never loosens.

use rustc_hash::FxHashMap;

use crate::error::ValidationError;
use crate::{OrderId, Price, Quantity, Side, Symbol, Timestamp};

/// How the distance between watermark and stop is computed.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrailMethod {
    /// Fixed distance in price ticks.
    Fixed(i64),
    /// Fraction of the watermark (e.g., 0.02 = 2%).
    Percentage(f64),
}

impl TrailMethod {
    /// Offset for the given watermark. Zero or less means "no level yet".
    ///
    /// A percentage of a positive watermark is at least one tick.
    pub fn offset(&self, watermark: Price) -> i64 {
        match *self {
            TrailMethod::Fixed(distance) => distance,
            TrailMethod::Percentage(pct) if watermark.0 > 0 => {
                ((watermark.0 as f64 * pct) as i64).max(1)
            }
            TrailMethod::Percentage(pct) => (watermark.0 as f64 * pct) as i64,
        }
    }
}

/// Parameters of a standalone trailing stop.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrailingRequest {
    pub symbol: Symbol,
    /// Side of the stop order: Sell protects a long, Buy protects a short.
    pub side: Side,
    pub quantity: Quantity,
    pub trail: TrailMethod,
    /// Start tracking only once the price reaches this level.
    #[cfg_attr(feature = "serde", serde(default))]
    pub activation_price: Option<Price>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub expiry: Option<Timestamp>,
}

impl TrailingRequest {
    /// A stop trailing by a fixed distance in price ticks.
    pub fn new(symbol: Symbol, side: Side, quantity: Quantity, distance: i64) -> Self {
        Self {
            symbol,
            side,
            quantity,
            trail: TrailMethod::Fixed(distance),
            activation_price: None,
            expiry: None,
        }
    }

    /// A stop trailing by a fraction of the watermark.
    pub fn percent(symbol: Symbol, side: Side, quantity: Quantity, fraction: f64) -> Self {
        Self {
            trail: TrailMethod::Percentage(fraction),
            ..Self::new(symbol, side, quantity, 0)
        }
    }

    pub fn with_activation(mut self, price: Price) -> Self {
        self.activation_price = Some(price);
        self
    }

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
        match self.trail {
            TrailMethod::Fixed(distance) if distance <= 0 => {
                return Err(ValidationError::NonPositiveTrailDistance);
            }
            // Written so that NaN is rejected too.
            TrailMethod::Percentage(pct) if !(pct > 0.0 && pct < 1.0) => {
                return Err(ValidationError::InvalidTrailPercentage);
            }
            _ => {}
        }
        if self.activation_price.is_some_and(|p| !p.is_positive()) {
            return Err(ValidationError::NonPositivePrice("activation price"));
        }
        if self.expiry.is_some_and(|expiry| expiry <= now) {
            return Err(ValidationError::ExpiryNotInFuture);
        }
        Ok(())
    }
}

/// Status of a trailing stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrailingStatus {
    /// Waiting for the activation price.
    Pending,
    /// Tracking the watermark.
    Active,
    /// Stop level was crossed; the driven order has been filled.
    Triggered,
    /// The driven order was cancelled or expired.
    Cancelled,
}

/// A trailing stop attached to one stop order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrailingStop {
    /// The stop order this drives.
    pub order_id: OrderId,
    pub symbol: Symbol,
    /// Side of the driven order (Sell protects a long).
    pub side: Side,
    pub trail: TrailMethod,
    /// Cleared on activation.
    pub activation_price: Option<Price>,
    /// Most favorable price since activation (None until the first active tick).
    pub watermark: Option<Price>,
    pub current_stop_price: Option<Price>,
    pub status: TrailingStatus,
}

impl TrailingStop {
    /// Returns true while the stop still reacts to ticks.
    pub fn is_live(&self) -> bool {
        matches!(self.status, TrailingStatus::Pending | TrailingStatus::Active)
    }

    fn activation_crossed(&self, price: Price, activation: Price) -> bool {
        match self.side {
            Side::Sell => price >= activation,
            Side::Buy => price <= activation,
        }
    }

    /// Update watermark and stop level. Returns the new level if it moved.
    fn track(&mut self, price: Price) -> Option<Price> {
        let watermark = match (self.side, self.watermark) {
            (_, None) => price,
            (Side::Sell, Some(old)) => old.max(price),
            (Side::Buy, Some(old)) => old.min(price),
        };
        self.watermark = Some(watermark);

        let offset = self.trail.offset(watermark);
        if offset <= 0 {
            return None;
        }
        // Levels saturate at the i64 bounds; such a level is never crossed.
        let candidate = match self.side {
            Side::Sell => Price(watermark.0.saturating_sub(offset)),
            Side::Buy => Price(watermark.0.saturating_add(offset)),
        };
        let tighter = match (self.side, self.current_stop_price) {
            (_, None) => true,
            (Side::Sell, Some(old)) => candidate > old,
            (Side::Buy, Some(old)) => candidate < old,
        };
        if tighter {
            self.current_stop_price = Some(candidate);
            Some(candidate)
        } else {
            None
        }
    }
}

/// What a tick did to one trailing stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrailingOutcome {
    /// The stop level moved in the position's favor.
    Moved { order_id: OrderId, stop_price: Price },
    /// The tick crossed the stop level.
    Triggered { order_id: OrderId, stop_price: Price },
}

/// All trailing stops of one symbol.
#[derive(Clone, Debug, Default)]
pub struct TrailingStopEngine {
    stops: FxHashMap<OrderId, TrailingStop>,
    /// Live stops in creation order (evaluation order on a tick).
    live: Vec<OrderId>,
}

impl TrailingStopEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a standalone trailing stop.
    ///
    /// Without an activation price the stop is `Active` at once and seeds
    /// its watermark from the next tick.
    pub fn create(
        &mut self,
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        trail: TrailMethod,
        activation_price: Option<Price>,
    ) {
        let status = if activation_price.is_some() {
            TrailingStatus::Pending
        } else {
            TrailingStatus::Active
        };
        self.insert(TrailingStop {
            order_id,
            symbol,
            side,
            trail,
            activation_price,
            watermark: None,
            current_stop_price: None,
            status,
        });
    }

    /// Attach an already-active trailing stop to an existing stop order
    /// (a bracket's stop-loss leg once its entry filled).
    pub fn arm(
        &mut self,
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        trail: TrailMethod,
        watermark: Price,
        stop_price: Option<Price>,
    ) {
        self.insert(TrailingStop {
            order_id,
            symbol,
            side,
            trail,
            activation_price: None,
            watermark: Some(watermark),
            current_stop_price: stop_price,
            status: TrailingStatus::Active,
        });
    }

    fn insert(&mut self, stop: TrailingStop) {
        let id = stop.order_id;
        if self.stops.insert(id, stop).is_none() {
            self.live.push(id);
        }
    }

    /// Process one tick. Outcomes are returned in creation order.
    pub fn on_tick(&mut self, price: Price) -> Vec<TrailingOutcome> {
        let mut outcomes = Vec::new();

        for id in &self.live {
            let Some(stop) = self.stops.get_mut(id) else {
                continue;
            };

            if stop.status == TrailingStatus::Pending {
                match stop.activation_price {
                    Some(activation) if stop.activation_crossed(price, activation) => {
                        stop.status = TrailingStatus::Active;
                        stop.activation_price = None;
                        stop.watermark = Some(price);
                        log::debug!("trailing stop {id} activated at {price}");
                    }
                    _ => continue,
                }
            }

            if let Some(stop_price) = stop.track(price) {
                outcomes.push(TrailingOutcome::Moved {
                    order_id: *id,
                    stop_price,
                });
            }

            if let Some(stop_price) = stop.current_stop_price {
                if stop.side.stop_crossed(price, stop_price) {
                    stop.status = TrailingStatus::Triggered;
                    outcomes.push(TrailingOutcome::Triggered {
                        order_id: *id,
                        stop_price,
                    });
                }
            }
        }

        if outcomes
            .iter()
            .any(|o| matches!(o, TrailingOutcome::Triggered { .. }))
        {
            self.prune();
        }
        outcomes
    }

    /// Stop tracking because the driven order left the book. Returns true if it was live.
    pub fn cancel(&mut self, order_id: OrderId) -> bool {
        match self.stops.get_mut(&order_id) {
            Some(stop) if stop.is_live() => {
                stop.status = TrailingStatus::Cancelled;
                self.prune();
                true
            }
            _ => false,
        }
    }

    fn prune(&mut self) {
        let stops = &self.stops;
        self.live
            .retain(|id| stops.get(id).is_some_and(TrailingStop::is_live));
    }

    /// Returns true if a live trailing stop drives this order.
    pub fn drives(&self, order_id: OrderId) -> bool {
        self.stops.get(&order_id).is_some_and(TrailingStop::is_live)
    }

    /// Get a trailing stop by the order it drives.
    pub fn get(&self, order_id: OrderId) -> Option<&TrailingStop> {
        self.stops.get(&order_id)
    }

    /// Number of live trailing stops.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Drop stops that no longer react to ticks.
    pub fn clear_history(&mut self) {
        self.stops.retain(|_, stop| stop.is_live());
    }
}
