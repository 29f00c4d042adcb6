//! Command line interface definition using clap.
//!
//! The binary inspects an extension configuration without running any
//! scenario: it validates it, lists resolved routes, and previews the
//! pluraliser used to derive routes.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Configuration file used when `--config` is omitted.
pub const DEFAULT_CONFIG: &str = "rest-steps.yml";

/// Inspect REST step configuration.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the extension configuration file.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: Utf8PathBuf,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute; defaults to `check` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Check);
        }
        self
    }
}

/// Available subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Load the configuration and report every consistency problem.
    Check,
    /// Print each configured entity type with its class and route.
    Routes,
    /// Print the plural of each word.
    Pluralize {
        /// Words to pluralise.
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["rest-steps"], Commands::Check, "rest-steps.yml", false)]
    #[case(&["rest-steps", "-v", "routes"], Commands::Routes, "rest-steps.yml", true)]
    #[case(
        &["rest-steps", "--config", "ci.yml", "pluralize", "box", "child"],
        Commands::Pluralize { words: vec!["box".into(), "child".into()] },
        "ci.yml",
        false
    )]
    fn parses_arguments(
        #[case] argv: &[&str],
        #[case] command: Commands,
        #[case] config: &str,
        #[case] verbose: bool,
    ) {
        let cli = Cli::try_parse_from(argv).map(Cli::with_default_command);
        let Ok(cli) = cli else {
            panic!("arguments should parse: {cli:?}");
        };
        assert_eq!(cli.command, Some(command));
        assert_eq!(cli.config, config);
        assert_eq!(cli.verbose, verbose);
    }

    #[test]
    fn pluralize_requires_words() {
        assert!(Cli::try_parse_from(["rest-steps", "pluralize"]).is_err());
    }
}
