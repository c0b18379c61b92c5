//! CLI entry point for the bracketbook journal runner.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use bracketbook_runner::audit::AuditLog;
use bracketbook_runner::config::Config;
use bracketbook_runner::error::{Error, Result};
use bracketbook_runner::render;
use bracketbook_runner::session::Session;

#[derive(Parser)]
#[command(name = "bbook-run")]
#[command(about = "Replay bracketbook journals: brackets, OCO groups and trailing stops")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a journal and print every event and the final book
    Run {
        /// Path to a .jsonl journal
        journal: PathBuf,

        /// Write the normalized journal here after the run
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Replay a journal and print only the final book
    Summary {
        /// Path to a .jsonl journal
        journal: PathBuf,
    },

    /// Replay a journal and fail if any command is rejected
    Check {
        /// Path to a .jsonl journal
        journal: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = execute(&config, cli.command) {
        match &e {
            Error::Rejected(_) => {
                eprintln!("Check failed: {e}");
                process::exit(2);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

fn execute(config: &Config, command: Command) -> Result<()> {
    let decimals = config.output.decimals;
    match command {
        Command::Run { journal, save } => {
            let session = replay(config, &journal)?;
            print!(
                "{}",
                render::report(config.output.format, session.steps(), session.engine(), decimals)?
            );
            if let Some(path) = save {
                session.save(&path)?;
                log::info!("journal written to {}", path.display());
            }
            Ok(())
        }
        Command::Summary { journal } => {
            let session = replay(config, &journal)?;
            print!(
                "{}",
                render::report(config.output.format, &[], session.engine(), decimals)?
            );
            Ok(())
        }
        Command::Check { journal } => {
            let session = replay(config, &journal)?;
            for step in session.rejections() {
                if let Some(reason) = &step.rejected {
                    println!("command {}: {reason}", step.index);
                }
            }
            session.ensure_clean()?;
            println!("{} commands ok", session.steps().len());
            Ok(())
        }
    }
}

fn replay(config: &Config, journal: &std::path::Path) -> Result<Session> {
    let session = Session::run_file(config, journal)?;
    log::info!(
        "replayed {} commands, {} events",
        session.steps().len(),
        session.events().count()
    );
    if let Some(path) = &config.audit.path {
        AuditLog::open(path)?.log_session(journal, &session)?;
    }
    Ok(session)
}
