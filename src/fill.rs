//! FillEvaluator: decides whether a tick fills an order.
//!
//! Pure functions of `(order, tick)`; no state is read or written here.
//!
//! | Kind      | Fills when                                 | At   |
//! |-----------|--------------------------------------------|------|
//! | Market    | always                                     | tick |
//! | Limit     | buy `tick <= price`, sell `tick >= price`  | tick |
//! | Stop      | buy `tick >= stop`, sell `tick <= stop`    | tick |
//! | StopLimit | stop rule and limit rule on the same tick  | tick |

use crate::{Order, OrderKind, Price, Timestamp};

/// Returns the fill price if `tick` fills `order`.
///
/// Terminal orders never fill. An order missing the price field its kind
/// needs (e.g. a trailing stop before its first level) does not fill.
pub fn should_fill(order: &Order, tick: Price) -> Option<Price> {
    if !order.is_active() {
        return None;
    }
    let side = order.side;
    let fills = match order.kind {
        OrderKind::Market => true,
        OrderKind::Limit => order.price.is_some_and(|limit| side.limit_crossed(tick, limit)),
        OrderKind::Stop => order.stop_price.is_some_and(|stop| side.stop_crossed(tick, stop)),
        OrderKind::StopLimit => match (order.stop_price, order.limit_price) {
            (Some(stop), Some(limit)) => {
                side.stop_crossed(tick, stop) && side.limit_crossed(tick, limit)
            }
            _ => false,
        },
    };
    fills.then_some(tick)
}

/// Returns true if the order is active and its expiry has been reached.
pub fn is_expired(order: &Order, now: Timestamp) -> bool {
    order.is_active() && order.expiry.is_some_and(|expiry| now >= expiry)
}
