//! File-based persistence of the command journal as JSON Lines.
//!
//! One command per line (`.jsonl`). Simple, streamable, and editable by
//! hand, which is also how scripted sessions are written for the runner:
//!
//! ```text
//! {"type":"create_bracket","at":0,"symbol":"EURUSD","side":"Buy","entry_price":10850,"quantity":1000,"stop_loss":10800,"take_profit":10950}
//! {"type":"price_tick","symbol":"EURUSD","price":10840}
//! ```

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::journal::Command;
use crate::{EngineConfig, IdGenerator, OrderEngine};

/// Save commands to a file, one JSON object per line.
pub fn save_commands(commands: &[Command], path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);

    for command in commands {
        let json = serde_json::to_string(command).map_err(io::Error::other)?;
        writeln!(writer, "{json}")?;
    }

    writer.flush()
}

/// Load commands from a JSON Lines file.
///
/// Blank lines and lines starting with `#` are skipped. Parse errors name
/// the offending line.
pub fn load_commands(path: &Path) -> io::Result<Vec<Command>> {
    let file = std::fs::File::open(path)?;
    read_commands(io::BufReader::new(file))
}

/// Parse commands from any buffered reader.
pub fn read_commands(reader: impl BufRead) -> io::Result<Vec<Command>> {
    let mut commands = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: Command = serde_json::from_str(line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", line_num + 1, e),
            )
        })?;
        commands.push(command);
    }

    Ok(commands)
}

impl OrderEngine {
    /// Save the engine's journal to a file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_commands(self.commands(), path)
    }

    /// Rebuild an engine from a saved journal with default policy and
    /// sequential ids.
    pub fn load(path: &Path) -> io::Result<Self> {
        let commands = load_commands(path)?;
        Ok(Self::replay(&commands))
    }

    /// Rebuild an engine from a saved journal with explicit policy and ids.
    pub fn load_with(
        config: EngineConfig,
        ids: Box<dyn IdGenerator>,
        path: &Path,
    ) -> io::Result<Self> {
        let commands = load_commands(path)?;
        Ok(Self::replay_with(config, ids, &commands))
    }
}
