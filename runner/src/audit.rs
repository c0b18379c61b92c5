//! JSONL audit trail.
//!
//! Each run appends one line per notable thing: the run start, every
//! event, every rejection and the final summary.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::session::Session;

/// An entry written to the trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub entry: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one entry with arbitrary JSON data.
    pub fn log(&mut self, entry: &'static str, data: serde_json::Value) -> Result<()> {
        let line = AuditEntry {
            entry,
            ts: Utc::now(),
            data,
        };
        writeln!(self.writer, "{}", serde_json::to_string(&line)?)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Record a finished session.
    pub fn log_session(&mut self, journal: &Path, session: &Session) -> Result<()> {
        self.log(
            "run_started",
            serde_json::json!({ "journal": journal.display().to_string() }),
        )?;
        for step in session.steps() {
            if let Some(reason) = &step.rejected {
                self.log(
                    "rejected",
                    serde_json::json!({ "index": step.index, "reason": reason }),
                )?;
            }
            for event in &step.events {
                self.log(
                    "event",
                    serde_json::json!({ "index": step.index, "event": event }),
                )?;
            }
        }
        self.log(
            "run_finished",
            serde_json::json!({ "summary": session.engine().portfolio_summary() }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketbook::{Command, EngineConfig, Price, SequentialIds, Symbol, TrailingRequest, Side};

    #[test]
    fn trail_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let btc = Symbol::new("BTC");

        let mut session = Session::new(EngineConfig::default(), Box::new(SequentialIds::new()));
        session.run(&[
            Command::CreateTrailing {
                at: 0,
                request: TrailingRequest::new(btc, Side::Sell, 1, 500),
            },
            Command::tick(1, btc, Price(44_000)),
            Command::tick(2, btc, Price(43_000)),
            Command::tick(3, btc, Price(-5)),
        ]);

        AuditLog::open(&path)
            .unwrap()
            .log_session(Path::new("session.jsonl"), &session)
            .unwrap();
        AuditLog::open(&path).unwrap().log("note", serde_json::json!({})).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<&str> = entries.iter().map(|e| e["entry"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            ["run_started", "event", "event", "rejected", "run_finished", "note"]
        );
        assert_eq!(entries[1]["event"]["type"], "trailing_stop_triggered");
        assert_eq!(entries[3]["index"], 4);
    }
}
