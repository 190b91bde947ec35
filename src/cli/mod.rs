//! Command-line interface for sd-card-backup.

use crate::backup::{Backup, BackupOptions, ConsoleProgress};
use crate::command::SystemCommandRunner;
use crate::config::Config;
use crate::sync::CopyStrategyKind;
use crate::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::io::{self, Write};
use std::path::PathBuf;

/// Back up SD cards into a date- and type-partitioned archive
#[derive(Parser, Debug)]
#[command(name = "sd-card-backup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Back up SD cards into a date- and type-partitioned archive")]
pub struct Cli {
    /// Print what would happen, but don't modify the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Config file (default: $XDG_CONFIG_HOME/sd-card-backup/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Copy strategy, overriding the config file
    #[arg(long, value_enum)]
    pub strategy: Option<CopyStrategyKind>,

    /// Keep going when a single file fails to copy
    #[arg(long)]
    pub continue_on_error: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print completions for the given shell and exit, e.g.:
    ///
    ///  sd-card-backup --completions fish | source # fish
    ///  source <(sd-card-backup --completions zsh) # zsh
    #[arg(long, value_name = "SHELL", verbatim_doc_comment)]
    pub completions: Option<Shell>,
}

impl Cli {
    fn options(&self, config: &Config) -> BackupOptions {
        BackupOptions {
            dry_run: self.dry_run,
            continue_on_error: self.continue_on_error || config.continue_on_error,
        }
    }

    fn strategy(&self, config: &Config) -> CopyStrategyKind {
        self.strategy.unwrap_or_else(|| config.strategy())
    }
}

/// Write the completion script for `shell`.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    clap_complete::generate(shell, &mut Cli::command(), "sd-card-backup", out);
}

/// Load config, run the pre-backup command, and back up every card.
pub fn run(cli: Cli) -> Result<()> {
    if let Some(shell) = cli.completions {
        write_completions(shell, &mut io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let options = cli.options(&config);
    let strategy = cli.strategy(&config);
    let backup = Backup::new(config, strategy, options)?;

    backup.run_command_before(&SystemCommandRunner)?;
    backup.backup_all_cards(&mut ConsoleProgress::new())?;

    Ok(())
}
