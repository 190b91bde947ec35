//! sd-card-backup
//!
//! Main binary entry point for the command-line interface.

use clap::Parser;
use sd_card_backup::cli::{self, Cli};
use sd_card_backup::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    cli::run(cli)?;
    Ok(())
}
