//! Error types for the runner.

use std::path::PathBuf;

/// All errors that can occur while running a journal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read journal {path}: {source}")]
    JournalRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write journal {path}: {source}")]
    JournalWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} command(s) rejected")]
    Rejected(usize),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
