use clap::Parser;
use wdo_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Logging needs --verbose, so it starts right after parsing.
    if let Err(e) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
    }

    if let Err(err) = cli.run() {
        eprintln!("wdo error: {:#}", err);
        std::process::exit(1);
    }
}
