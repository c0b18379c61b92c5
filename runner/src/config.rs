//! TOML configuration loading and validation.
//!
//! Every section and key is optional; an empty file is the default setup:
//!
//! ```toml
//! [engine]
//! gate_exit_legs = true
//! exit_tie_break = "stop_loss"   # or "take_profit"
//!
//! [ids]
//! scheme = "sequential"          # or "scrambled"
//! seed = 0
//!
//! [output]
//! format = "text"                # or "json"
//! decimals = 4
//!
//! [audit]
//! path = "./logs/audit.jsonl"
//! ```

use std::path::{Path, PathBuf};

use bracketbook::{EngineConfig, IdGenerator, ScrambledIds, SequentialIds};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ids: IdsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    #[default]
    Sequential,
    Scrambled,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdsConfig {
    #[serde(default)]
    pub scheme: IdScheme,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            decimals: default_decimals(),
        }
    }
}

fn default_decimals() -> u32 {
    4
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Append-only JSONL trail; no trail when unset.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Load config from a file if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.output.decimals > 8 {
            return Err(Error::Config("output.decimals must be <= 8".into()));
        }
        if self.ids.scheme == IdScheme::Sequential && self.ids.seed != 0 {
            return Err(Error::Config(
                "ids.seed only applies to the scrambled scheme".into(),
            ));
        }
        Ok(())
    }

    /// A fresh id generator for this config. Replays of one journal must use
    /// the same scheme and seed as the recording.
    pub fn id_generator(&self) -> Box<dyn IdGenerator> {
        match self.ids.scheme {
            IdScheme::Sequential => Box::new(SequentialIds::new()),
            IdScheme::Scrambled => Box::new(ScrambledIds::new(self.ids.seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketbook::TieBreak;

    fn example_toml() -> &'static str {
        r#"
[engine]
gate_exit_legs = false
exit_tie_break = "take_profit"

[ids]
scheme = "scrambled"
seed = 42

[output]
format = "json"
decimals = 2

[audit]
path = "logs/audit.jsonl"
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::parse(example_toml()).unwrap();
        assert!(!config.engine.gate_exit_legs);
        assert_eq!(config.engine.exit_tie_break, TieBreak::TakeProfit);
        assert_eq!(config.ids.scheme, IdScheme::Scrambled);
        assert_eq!(config.ids.seed, 42);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.decimals, 2);
        assert_eq!(config.audit.path, Some(PathBuf::from("logs/audit.jsonl")));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.ids.scheme, IdScheme::Sequential);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.decimals, 4);
        assert!(config.audit.path.is_none());
    }

    #[test]
    fn partial_engine_section() {
        let config = Config::parse("[engine]\nexit_tie_break = \"take_profit\"\n").unwrap();
        assert!(config.engine.gate_exit_legs);
        assert_eq!(config.engine.exit_tie_break, TieBreak::TakeProfit);
    }

    #[test]
    fn reject_too_many_decimals() {
        let err = Config::parse("[output]\ndecimals = 12\n").unwrap_err();
        assert!(err.to_string().contains("decimals"));
    }

    #[test]
    fn reject_seed_without_scrambling() {
        assert!(Config::parse("[ids]\nseed = 7\n").is_err());
    }

    #[test]
    fn reject_unknown_section() {
        assert!(matches!(
            Config::parse("[broker]\nhost = \"x\"\n"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn generators_follow_scheme() {
        let mut ids = Config::default().id_generator();
        assert_eq!(ids.next_id(), 1);

        let config = Config::parse("[ids]\nscheme = \"scrambled\"\nseed = 9\n").unwrap();
        let a = config.id_generator().next_id();
        let b = config.id_generator().next_id();
        assert_eq!(a, b);
        assert_ne!(a, 1);
    }
}
