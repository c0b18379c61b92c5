//! Text and JSON rendering of replay results.

use std::fmt::Write as _;

use bracketbook::{Event, Order, OrderEngine, OrderKind, PortfolioSummary, Price};
use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::session::Step;

/// Render one event with scaled prices.
pub fn event_line(event: &Event, decimals: u32) -> String {
    let px = |p: Price| p.format_scaled(decimals);
    match *event {
        Event::OrderFilled {
            order_id,
            symbol,
            price,
            quantity,
            side,
        } => format!("FILLED  {order_id} {side} {quantity} {symbol} @ {}", px(price)),
        Event::TrailingStopTriggered {
            order_id,
            symbol,
            price,
            stop_price,
        } => format!(
            "TRAIL   {order_id} {symbol} stop {} hit by {}",
            px(stop_price),
            px(price)
        ),
        Event::OrderExpired { order_id, symbol } => format!("EXPIRED {order_id} {symbol}"),
    }
}

/// Render one order as a table row.
pub fn order_line(order: &Order, decimals: u32) -> String {
    let px = |p: Option<Price>| p.map_or_else(|| "-".to_string(), |p| p.format_scaled(decimals));
    let levels = match order.kind {
        OrderKind::Market => String::new(),
        OrderKind::Limit => format!("@ {}", px(order.price)),
        OrderKind::Stop => format!("stop {}", px(order.stop_price)),
        OrderKind::StopLimit => {
            format!("stop {} limit {}", px(order.stop_price), px(order.limit_price))
        }
    };
    let group = match order.bracket_role() {
        Some(role) => format!(" [{role}]"),
        None if order.group_ref.is_some() => " [oco]".to_string(),
        None => String::new(),
    };
    format!(
        "{:<8} {:<8} {:<4} {:<10} {:>8} {}{}",
        order.id.to_string(),
        order.symbol,
        order.side.to_string(),
        order.kind.to_string(),
        order.quantity,
        levels,
        group
    )
}

/// Text report of a whole session.
pub fn text_report(steps: &[Step], engine: &OrderEngine, decimals: u32) -> String {
    let mut out = String::new();
    for step in steps {
        if let Some(reason) = &step.rejected {
            let _ = writeln!(out, "#{:<4} REJECTED {reason}", step.index);
        }
        for event in &step.events {
            let _ = writeln!(out, "#{:<4} {}", step.index, event_line(event, decimals));
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&summary_text(engine, decimals));
    out
}

/// Summary block: counts, then every active order.
pub fn summary_text(engine: &OrderEngine, decimals: u32) -> String {
    let mut out = engine.portfolio_summary().to_string();
    let active = engine.list_active_orders(None);
    if !active.is_empty() {
        out.push_str("\n\nactive orders:");
        for order in active {
            let _ = write!(out, "\n  {}", order_line(order, decimals));
        }
    }
    out.push('\n');
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    steps: &'a [Step],
    summary: PortfolioSummary,
    active_orders: Vec<&'a Order>,
}

/// JSON report of a whole session.
pub fn json_report(steps: &[Step], engine: &OrderEngine) -> Result<String> {
    let report = JsonReport {
        steps,
        summary: engine.portfolio_summary(),
        active_orders: engine.list_active_orders(None),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Report in the configured format.
pub fn report(
    format: OutputFormat,
    steps: &[Step],
    engine: &OrderEngine,
    decimals: u32,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text_report(steps, engine, decimals)),
        OutputFormat::Json => json_report(steps, engine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketbook::{OrderId, Side, Symbol};

    #[test]
    fn event_lines_scale_prices() {
        let fill = Event::OrderFilled {
            order_id: OrderId(2),
            symbol: Symbol::new("EURUSD"),
            price: Price(1_0840),
            quantity: 1000,
            side: Side::Buy,
        };
        assert_eq!(event_line(&fill, 4), "FILLED  O2 BUY 1000 EURUSD @ 1.0840");

        let trail = Event::TrailingStopTriggered {
            order_id: OrderId(1),
            symbol: Symbol::new("BTC"),
            price: Price(44_200),
            stop_price: Price(44_500),
        };
        assert_eq!(event_line(&trail, 0), "TRAIL   O1 BTC stop 44500 hit by 44200");
    }

    #[test]
    fn order_line_shows_levels() {
        let order = Order::stop(OrderId(3), Symbol::new("EURUSD"), Side::Sell, Some(Price(1_0800)), 1000, 0);
        let line = order_line(&order, 4);
        assert!(line.starts_with("O3 "));
        assert!(line.contains("stop 1.0800"));
    }

    #[test]
    fn empty_engine_report() {
        let engine = OrderEngine::new();
        let text = text_report(&[], &engine, 2);
        assert!(text.starts_with("active orders:  0"));
        assert!(!text.contains("\n\nactive orders:"));

        let json = json_report(&[], &engine).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["active_orders"], 0);
    }
}
