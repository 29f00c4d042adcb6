//! CLI execution.
//!
//! Loads the configuration named on the command line and carries out the
//! selected subcommand, writing its report to stdout.

use crate::cli::{Cli, Commands};
use crate::config::ExtensionConfig;
use crate::pluralize::pluralize;
use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use tracing::{debug, info};

/// Execute the parsed [`Cli`] commands.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, has problems, or
/// the report cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    let stdout = io::stdout();
    run_to(cli, &mut stdout.lock())
}

/// Execute `cli`, writing the report to `out`.
///
/// # Errors
///
/// See [`run`].
pub fn run_to(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command.clone().unwrap_or(Commands::Check) {
        Commands::Check => check(cli, out),
        Commands::Routes => routes(cli, out),
        Commands::Pluralize { words } => {
            for word in words {
                writeln!(out, "{}", pluralize(&word))?;
            }
            Ok(())
        }
    }
}

fn load(cli: &Cli) -> Result<ExtensionConfig> {
    debug!(path = %cli.config, "loading configuration");
    ExtensionConfig::from_path(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))
}

fn check(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config = load(cli)?;
    let problems = config.problems();
    if !problems.is_empty() {
        for problem in &problems {
            writeln!(out, "problem: {problem}")?;
        }
        bail!(
            "{} has {} configuration problem(s)",
            cli.config,
            problems.len()
        );
    }
    info!(entity_types = config.entities.len(), "configuration valid");
    writeln!(
        out,
        "{}: ok ({} entity type(s), base URI {})",
        cli.config,
        config.entities.len(),
        config.api.base_uri
    )?;
    Ok(())
}

fn routes(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config = load(cli)?;
    for (entity_type, descriptor) in config.entities.iter() {
        let route = config.entities.route(entity_type)?;
        writeln!(out, "{entity_type}\t{}\t/{route}", descriptor.entity)?;
    }
    Ok(())
}
