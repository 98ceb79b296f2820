//! Command-line interface, built on clap.
//!
//! Defines the [`Cli`] struct with the [`Command`] subcommands (run, stats,
//! check) and global flags (--config, --verbose).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// telexport — supervises the export backend and drives export jobs.
#[derive(Debug, Parser)]
#[command(name = "telexport", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (defaults to ./telexport.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the backend and run one export job to completion.
    Run {
        /// Re-export messages that were already exported.
        #[arg(long)]
        force: bool,
    },

    /// Start the backend and print the export summary.
    Stats,

    /// Start the backend, report readiness, and shut it down again.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["telexport", "run"]);
        match cli.command {
            Command::Run { force } => assert!(!force),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_run_with_force() {
        let cli = Cli::parse_from(["telexport", "run", "--force"]);
        match cli.command {
            Command::Run { force } => assert!(force),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "telexport",
            "--config",
            "custom.toml",
            "--verbose",
            "stats",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config.unwrap(), PathBuf::from("custom.toml"));
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
