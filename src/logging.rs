//! Diagnostic logging setup.
//!
//! Per-file progress lines are printed by [`crate::backup::ConsoleProgress`];
//! this only covers `tracing` output, which goes to stderr.

use tracing_subscriber::EnvFilter;

const TARGET: &str = "sd_card_backup";

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(format!("{}=debug", TARGET))
    } else {
        EnvFilter::new(format!("{}=warn", TARGET))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
