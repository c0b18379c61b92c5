//! bracketbook-runner: replays bracketbook journals.
//!
//! Reads a JSON Lines journal of engine commands (recorded by
//! `OrderEngine::save` or written by hand), replays it with the policy and
//! id scheme from a TOML config, and reports events, rejections and the
//! final book. Every run can append to a JSONL audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
