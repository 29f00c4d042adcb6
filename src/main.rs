//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use rest_steps::{cli::Cli, logging, runner};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse().with_default_command();
    logging::init(cli.verbose);
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let chain = format!("{err:#}");
            tracing::error!(error = %chain, "runner failed");
            ExitCode::FAILURE
        }
    }
}
