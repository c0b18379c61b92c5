// Allow our fixed-point digit grouping convention (e.g., 1_0850 = 1.0850)
#![allow(clippy::inconsistent_digit_grouping)]

//! Integration tests for journal replay through the runner.

use std::path::Path;

use bracketbook::{BracketStatus, BracketId, Event, OrderId, OrderStatus, Price};
use bracketbook_runner::config::{Config, OutputFormat};
use bracketbook_runner::error::Error;
use bracketbook_runner::render;
use bracketbook_runner::session::Session;

fn scripted_journal() -> &'static str {
    r#"
# long EURUSD bracket, then a dip and a rally
{"type":"create_bracket","at":0,"symbol":"EURUSD","side":"Buy","entry_price":10850,"quantity":1000,"stop_loss":10800,"take_profit":10950}
{"type":"price_tick","at":1,"symbol":"EURUSD","price":10840}
{"type":"price_tick","at":2,"symbol":"EURUSD","price":10900}
{"type":"price_tick","at":3,"symbol":"EURUSD","price":10960}
"#
}

fn write_journal(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn scripted_bracket_closes_on_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_journal(dir.path(), "session.jsonl", scripted_journal());

    let session = Session::run_file(&Config::default(), &path).unwrap();
    let engine = session.engine();

    let fills: Vec<(OrderId, Price)> = session
        .events()
        .filter_map(|e| match *e {
            Event::OrderFilled { order_id, price, .. } => Some((order_id, price)),
            _ => None,
        })
        .collect();
    assert_eq!(fills, vec![(OrderId(2), Price(1_0840)), (OrderId(4), Price(1_0960))]);
    assert_eq!(engine.get_order(OrderId(3)).unwrap().status, OrderStatus::Cancelled);
    assert_eq!(engine.get_bracket(BracketId(1)).unwrap().status, BracketStatus::Closed);
    assert!(session.ensure_clean().is_ok());
}

#[test]
fn saved_journal_replays_identically() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_journal(dir.path(), "in.jsonl", scripted_journal());
    let output = dir.path().join("out.jsonl");

    let first = Session::run_file(&Config::default(), &input).unwrap();
    first.save(&output).unwrap();
    let second = Session::run_file(&Config::default(), &output).unwrap();

    assert_eq!(first.steps(), second.steps());
    assert_eq!(
        first.engine().portfolio_summary(),
        second.engine().portfolio_summary()
    );
}

#[test]
fn config_policy_changes_outcome() {
    let dir = tempfile::tempdir().unwrap();
    // Exits live from creation: a drop through entry and stop fills both.
    let path = write_journal(
        dir.path(),
        "ungated.jsonl",
        r#"{"type":"create_bracket","symbol":"EURUSD","side":"Buy","entry_price":10850,"quantity":1000,"stop_loss":10800,"take_profit":10950}
{"type":"price_tick","symbol":"EURUSD","price":10790}
"#,
    );

    let gated = Session::run_file(&Config::default(), &path).unwrap();
    assert_eq!(gated.events().count(), 1);

    let config = Config::parse("[engine]\ngate_exit_legs = false\n").unwrap();
    let ungated = Session::run_file(&config, &path).unwrap();
    assert_eq!(ungated.events().count(), 2);
}

#[test]
fn scrambled_ids_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_journal(dir.path(), "session.jsonl", scripted_journal());
    let config = Config::parse("[ids]\nscheme = \"scrambled\"\nseed = 1234\n").unwrap();

    let a = Session::run_file(&config, &path).unwrap();
    let b = Session::run_file(&config, &path).unwrap();
    let ids = |s: &Session| s.events().map(Event::order_id).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
    assert!(ids(&a).iter().all(|id| id.0 != 2));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn rejected_commands_fail_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_journal(
        dir.path(),
        "bad.jsonl",
        r#"{"type":"create_bracket","symbol":"EURUSD","side":"Buy","entry_price":10850,"quantity":1000,"stop_loss":10900,"take_profit":10950}
{"type":"cancel","order_id":7}
"#,
    );

    let session = Session::run_file(&Config::default(), &path).unwrap();
    let rejected: Vec<_> = session.rejections().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(
        rejected[0].rejected.as_deref(),
        Some("stop loss must be below entry for BUY")
    );
    assert!(matches!(session.ensure_clean(), Err(Error::Rejected(1))));
}

#[test]
fn malformed_journal_names_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_journal(dir.path(), "broken.jsonl", "\n{\"type\":\"price_tick\"}\n");

    let err = Session::run_file(&Config::default(), &path).err().unwrap();
    assert!(matches!(err, Error::JournalRead { .. }));
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn missing_config_file() {
    let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigRead { .. }));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn text_report_lists_events_and_book() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_journal(
        dir.path(),
        "open.jsonl",
        r#"{"type":"create_bracket","symbol":"EURUSD","side":"Buy","entry_price":10850,"quantity":1000,"stop_loss":10800,"take_profit":10950}
{"type":"price_tick","symbol":"EURUSD","price":10850}
"#,
    );
    let session = Session::run_file(&Config::default(), &path).unwrap();

    let text = render::report(OutputFormat::Text, session.steps(), session.engine(), 4).unwrap();
    assert!(text.contains("#2    FILLED  O2 BUY 1000 EURUSD @ 1.0850"));
    assert!(text.contains("stop 1.0800 [stop_loss]"));
    assert!(text.contains("@ 1.0950 [take_profit]"));

    let json = render::report(OutputFormat::Json, session.steps(), session.engine(), 4).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["summary"]["bracket_orders"], 1);
    assert_eq!(value["active_orders"].as_array().unwrap().len(), 2);
}
