//! Interactive order lifecycle CLI.
//!
//! A REPL for experimenting with bracket, OCO and trailing-stop orders.
//!
//! Usage:
//!   cargo run --bin bbook [decimals]
//!   bbook 4   (prices like 1.0850)

use bracketbook::{
    BracketId, BracketRequest, Event, OcoId, OcoLeg, OcoRequest, Order, OrderEngine, OrderId,
    Price, Side, Symbol, TrailMethod, TrailingRequest,
};
use std::io::{self, BufRead, Write};

struct Session {
    engine: OrderEngine,
    decimals: u32,
}

fn main() {
    let decimals = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .filter(|d: &u32| *d <= 8)
        .unwrap_or(2);
    let mut session = Session {
        engine: OrderEngine::new(),
        decimals,
    };

    println!("Bracketbook CLI v{}", env!("CARGO_PKG_VERSION"));
    println!("Prices use {decimals} decimals. Type 'help' for commands, 'quit' to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("bbook> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break, // EOF
            Ok(_) => {}
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts.first().map(|s| s.to_lowercase());

        match cmd.as_deref() {
            Some("help" | "h" | "?") => print_help(),
            Some("quit" | "exit" | "q") => break,
            Some("bracket" | "br") => session.handle_bracket(&parts[1..]),
            Some("oco") => session.handle_oco(&parts[1..]),
            Some("trail" | "tr") => session.handle_trail(&parts[1..]),
            Some("tick" | "t") => session.handle_tick(&parts[1..]),
            Some("cancel" | "c") => session.handle_cancel(&parts[1..]),
            Some("status" | "s") => session.handle_status(&parts[1..]),
            Some("orders" | "o") => session.handle_orders(&parts[1..]),
            Some("summary") => println!("{}", session.engine.portfolio_summary()),
            Some("clear") => {
                session.engine = OrderEngine::new();
                println!("Engine reset.");
            }
            Some(cmd) => println!("Unknown command: '{cmd}'. Type 'help' for commands."),
            None => {}
        }
    }

    println!("Goodbye!");
}

fn print_help() {
    println!(
        r#"
Commands:
  bracket <buy|sell> <sym> <entry> <qty> <stop> <target> [trail <dist>]
                                  Entry limit plus stop-loss and take-profit
  oco <sym> <qty> <leg> <leg>...  One-cancels-other group; leg is
                                  side:market | side:limit:P | side:stop:P | side:stoplimit:S:L
  trail <buy|sell> <sym> <qty> <dist|pct%> [activation]
                                  Trailing stop (sell protects a long)
  tick <sym> <price>...           Feed one or more prices
  cancel <id>                     Cancel an order (O12), bracket (BR3) or oco (OCO7)
  status <id>                     Show an order
  orders [sym]                    List active orders
  summary                         Portfolio summary
  clear                           Reset the engine
  help                            Show this help
  quit                            Exit

Examples:
  bracket buy EURUSD 1.0850 1000 1.0800 1.0950
  oco GBPUSD 500 sell:limit:1.2750 sell:stop:1.2650
  trail sell BTC 1 500 43500
  tick EURUSD 1.0840 1.0850 1.0960
"#
    );
}

impl Session {
    fn fmt_price(&self, price: Price) -> String {
        price.format_scaled(self.decimals)
    }

    fn print_events(&self, events: &[Event]) {
        for event in events {
            match *event {
                Event::OrderFilled {
                    order_id,
                    symbol,
                    price,
                    quantity,
                    side,
                } => println!(
                    "  FILLED   {:<6} {side} {quantity} {symbol} @ {}",
                    order_id.to_string(),
                    self.fmt_price(price)
                ),
                Event::TrailingStopTriggered {
                    order_id,
                    symbol,
                    price,
                    stop_price,
                } => println!(
                    "  TRIGGER  {:<6} {symbol} stop {} hit at {}",
                    order_id.to_string(),
                    self.fmt_price(stop_price),
                    self.fmt_price(price)
                ),
                Event::OrderExpired { order_id, symbol } => {
                    println!("  EXPIRED  {:<6} {symbol}", order_id.to_string())
                }
            }
        }
    }

    fn handle_bracket(&mut self, args: &[&str]) {
        if args.len() < 6 {
            println!("Usage: bracket <buy|sell> <sym> <entry> <qty> <stop> <target> [trail <dist>]");
            return;
        }
        let Some(side) = parse_side(args[0]) else {
            println!("Invalid side: '{}'. Use buy or sell.", args[0]);
            return;
        };
        let Some(symbol) = parse_symbol(args[1]) else {
            return;
        };
        let (Some(entry), Some(stop), Some(target)) = (
            self.parse_price(args[2]),
            self.parse_price(args[4]),
            self.parse_price(args[5]),
        ) else {
            println!("Invalid price in '{} {} {}'", args[2], args[4], args[5]);
            return;
        };
        let Some(qty) = parse_qty(args[3]) else {
            return;
        };

        let mut request = BracketRequest::new(symbol, side, entry, qty, stop, target);
        if let ["trail", dist] = &args[6..] {
            let Some(distance) = self.parse_price(dist) else {
                println!("Invalid trailing distance: '{dist}'");
                return;
            };
            request = request.with_trailing(distance.0);
        }

        match self.engine.create_bracket_order(request) {
            Ok(h) => println!(
                "Bracket {}: entry {}  stop {}  target {}",
                h.bracket_id, h.entry_order_id, h.stop_order_id, h.take_profit_order_id
            ),
            Err(e) => println!("Rejected: {e}"),
        }
    }

    fn handle_oco(&mut self, args: &[&str]) {
        if args.len() < 4 {
            println!("Usage: oco <sym> <qty> <leg> <leg>...");
            return;
        }
        let Some(symbol) = parse_symbol(args[0]) else {
            return;
        };
        let Some(qty) = parse_qty(args[1]) else {
            return;
        };
        let mut legs = Vec::new();
        for spec in &args[2..] {
            match self.parse_leg(spec) {
                Some(leg) => legs.push(leg),
                None => {
                    println!("Invalid leg: '{spec}'");
                    return;
                }
            }
        }

        match self.engine.create_oco_order(OcoRequest::new(symbol, qty, legs)) {
            Ok(h) => {
                let ids: Vec<String> = h.order_ids.iter().map(ToString::to_string).collect();
                println!("OCO {}: {}", h.oco_id, ids.join(" "));
            }
            Err(e) => println!("Rejected: {e}"),
        }
    }

    fn parse_leg(&self, spec: &str) -> Option<OcoLeg> {
        let fields: Vec<&str> = spec.split(':').collect();
        let side = parse_side(fields.first()?)?;
        let kind = fields.get(1)?.to_lowercase();
        match (kind.as_str(), &fields[2..]) {
            ("market", []) => Some(OcoLeg::market(side)),
            ("limit", [p]) => Some(OcoLeg::limit(side, self.parse_price(p)?)),
            ("stop", [p]) => Some(OcoLeg::stop(side, self.parse_price(p)?)),
            ("stoplimit", [s, l]) => Some(OcoLeg::stop_limit(
                side,
                self.parse_price(s)?,
                self.parse_price(l)?,
            )),
            _ => None,
        }
    }

    fn handle_trail(&mut self, args: &[&str]) {
        if args.len() < 4 {
            println!("Usage: trail <buy|sell> <sym> <qty> <dist|pct%> [activation]");
            return;
        }
        let Some(side) = parse_side(args[0]) else {
            println!("Invalid side: '{}'. Use buy or sell.", args[0]);
            return;
        };
        let Some(symbol) = parse_symbol(args[1]) else {
            return;
        };
        let Some(qty) = parse_qty(args[2]) else {
            return;
        };
        let trail = match args[3].strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok().map(|p| TrailMethod::Percentage(p / 100.0)),
            None => self.parse_price(args[3]).map(|d| TrailMethod::Fixed(d.0)),
        };
        let Some(trail) = trail else {
            println!("Invalid trailing distance: '{}'", args[3]);
            return;
        };

        let mut request = TrailingRequest::new(symbol, side, qty, 0);
        request.trail = trail;
        if let Some(raw) = args.get(4) {
            let Some(activation) = self.parse_price(raw) else {
                println!("Invalid activation price: '{raw}'");
                return;
            };
            request = request.with_activation(activation);
        }

        match self.engine.create_trailing_stop(request) {
            Ok(id) => println!("Trailing stop {id}"),
            Err(e) => println!("Rejected: {e}"),
        }
    }

    fn handle_tick(&mut self, args: &[&str]) {
        if args.len() < 2 {
            println!("Usage: tick <sym> <price>...");
            return;
        }
        let Some(symbol) = parse_symbol(args[0]) else {
            return;
        };
        let mut ticks = Vec::new();
        for raw in &args[1..] {
            match self.parse_price(raw) {
                Some(price) => ticks.push((symbol, price)),
                None => {
                    println!("Invalid price: '{raw}'");
                    return;
                }
            }
        }

        for (symbol, price) in ticks {
            match self.engine.submit_price_tick(symbol, price) {
                Ok(events) if events.is_empty() => {}
                Ok(events) => {
                    println!("{symbol} @ {}", self.fmt_price(price));
                    self.print_events(&events);
                }
                Err(e) => println!("Rejected: {e}"),
            }
        }
    }

    fn handle_cancel(&mut self, args: &[&str]) {
        let Some(raw) = args.first() else {
            println!("Usage: cancel <id>");
            return;
        };
        let upper = raw.to_uppercase();
        let (done, what) = if let Some(n) = upper.strip_prefix("BR").and_then(|n| n.parse().ok()) {
            (self.engine.cancel_bracket(BracketId(n)), format!("bracket BR{n}"))
        } else if let Some(n) = upper.strip_prefix("OCO").and_then(|n| n.parse().ok()) {
            (self.engine.cancel_oco(OcoId(n)), format!("oco OCO{n}"))
        } else if let Some(id) = parse_order_id(raw) {
            (self.engine.cancel_order(id), format!("order {id}"))
        } else {
            println!("Invalid id: '{raw}'");
            return;
        };

        if done {
            println!("Cancelled {what}");
        } else {
            println!("Nothing to cancel for {what} (unknown or already final)");
        }
    }

    fn handle_status(&self, args: &[&str]) {
        let Some(id) = args.first().and_then(|raw| parse_order_id(raw)) else {
            println!("Usage: status <order_id>");
            return;
        };

        match self.engine.get_order(id) {
            Some(order) => {
                println!("Order {id}:");
                println!("  Symbol:    {}", order.symbol);
                println!("  Side:      {}", order.side);
                println!("  Kind:      {}", order.kind);
                if let Some(p) = order.price {
                    println!("  Price:     {}", self.fmt_price(p));
                }
                if let Some(p) = order.stop_price {
                    println!("  Stop:      {}", self.fmt_price(p));
                }
                if let Some(p) = order.limit_price {
                    println!("  Limit:     {}", self.fmt_price(p));
                }
                println!("  Quantity:  {} (filled: {})", order.quantity, order.filled_quantity);
                println!("  Status:    {:?}", order.status);
                if let Some(group) = order.group_ref {
                    println!("  Group:     {group:?}");
                }
                if let Some(stop) = self.engine.get_trailing_stop(id) {
                    println!("  Trailing:  {:?} {:?}", stop.trail, stop.status);
                }
            }
            None => println!("Order {id} not found"),
        }
    }

    fn handle_orders(&self, args: &[&str]) {
        let symbol = match args.first() {
            Some(raw) => match parse_symbol(raw) {
                Some(sym) => Some(sym),
                None => return,
            },
            None => None,
        };
        let orders = self.engine.list_active_orders(symbol);
        if orders.is_empty() {
            println!("No active orders.");
            return;
        }

        println!();
        println!(
            "  {:<6}  {:<8}  {:<4}  {:<9}  {:>8}  {:>10}",
            "ID", "Symbol", "Side", "Kind", "Qty", "Level"
        );
        println!("  ────────────────────────────────────────────────────");
        for order in orders {
            println!(
                "  {:<6}  {:<8}  {:<4}  {:<9}  {:>8}  {:>10}",
                order.id.to_string(),
                order.symbol,
                order.side.to_string(),
                order.kind.to_string(),
                order.quantity,
                self.level(order)
            );
        }
        println!();
    }

    fn level(&self, order: &Order) -> String {
        order
            .price
            .or(order.stop_price)
            .map(|p| self.fmt_price(p))
            .unwrap_or_else(|| "-".to_string())
    }

    /// Parse a decimal price exactly, without going through floats.
    fn parse_price(&self, s: &str) -> Option<Price> {
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if frac.len() > self.decimals as usize || whole.starts_with('-') {
            return None;
        }
        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac_value: i64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
        for _ in frac.len()..self.decimals as usize {
            frac_value *= 10;
        }
        let price = whole
            .checked_mul(10i64.pow(self.decimals))?
            .checked_add(frac_value)?;
        (price > 0).then_some(Price(price))
    }
}

fn parse_side(s: &str) -> Option<Side> {
    match s.to_lowercase().as_str() {
        "buy" | "b" => Some(Side::Buy),
        "sell" | "s" => Some(Side::Sell),
        _ => None,
    }
}

fn parse_symbol(s: &str) -> Option<Symbol> {
    let symbol = Symbol::try_new(&s.to_uppercase());
    if symbol.is_none() {
        println!("Invalid symbol: '{s}' (max {} characters)", Symbol::MAX_LEN);
    }
    symbol
}

fn parse_qty(s: &str) -> Option<u64> {
    match s.parse() {
        Ok(q) if q > 0 => Some(q),
        _ => {
            println!("Invalid quantity: '{s}'");
            None
        }
    }
}

fn parse_order_id(s: &str) -> Option<OrderId> {
    let digits = s.strip_prefix(['O', 'o']).unwrap_or(s);
    digits.parse().ok().map(OrderId)
}
