//! Journal replay with per-command outcomes.

use std::path::Path;

use bracketbook::persistence::load_commands;
use bracketbook::{
    ApplyResult, Command, EngineConfig, Event, IdGenerator, ManualClock, OrderEngine,
    ValidationError,
};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};

/// What one journal command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// 1-based position in the journal
    pub index: usize,
    pub command: Command,
    pub events: Vec<Event>,
    /// Validation message if the command was rejected
    pub rejected: Option<String>,
}

/// A replayed journal.
pub struct Session {
    engine: OrderEngine,
    clock: ManualClock,
    steps: Vec<Step>,
}

impl Session {
    /// Empty session with the given policy and ids.
    pub fn new(engine_config: EngineConfig, ids: Box<dyn IdGenerator>) -> Self {
        let clock = ManualClock::new(0);
        let engine = OrderEngine::with_parts(engine_config, ids, Box::new(clock.clone()));
        Self {
            engine,
            clock,
            steps: Vec::new(),
        }
    }

    /// Empty session set up from a runner config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.engine, config.id_generator())
    }

    /// Load a journal file and run every command in it.
    pub fn run_file(config: &Config, path: &Path) -> Result<Self> {
        let commands = load_commands(path).map_err(|e| Error::JournalRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut session = Self::from_config(config);
        session.run(&commands);
        Ok(session)
    }

    /// Apply commands in order. Rejections are recorded and do not stop the run.
    pub fn run(&mut self, commands: &[Command]) {
        for command in commands {
            self.step(command);
        }
    }

    /// Apply one command.
    pub fn step(&mut self, command: &Command) -> &Step {
        self.clock.set(command.at());
        let result = self.engine.apply(command);
        let index = self.steps.len() + 1;

        let rejected = result.error().map(|e: ValidationError| e.to_string());
        if let Some(reason) = &rejected {
            log::warn!("command {index} rejected: {reason}");
        }
        if let ApplyResult::Cancelled(false) = result {
            log::debug!("command {index}: nothing to cancel");
        }

        self.steps.push(Step {
            index,
            command: command.clone(),
            events: result.events().to_vec(),
            rejected,
        });
        &self.steps[index - 1]
    }

    pub fn engine(&self) -> &OrderEngine {
        &self.engine
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// All events, in journal order.
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.steps.iter().flat_map(|s| s.events.iter())
    }

    /// Steps that were rejected.
    pub fn rejections(&self) -> impl Iterator<Item = &Step> + '_ {
        self.steps.iter().filter(|s| s.rejected.is_some())
    }

    /// Fail with [`Error::Rejected`] if any command was rejected.
    pub fn ensure_clean(&self) -> Result<()> {
        match self.rejections().count() {
            0 => Ok(()),
            n => Err(Error::Rejected(n)),
        }
    }

    /// Write the engine's journal. The output is normalized: every line
    /// carries its timestamp and all defaulted fields.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.engine.save(path).map_err(|e| Error::JournalWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
