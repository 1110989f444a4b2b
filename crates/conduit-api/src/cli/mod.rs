//! CLI command definitions for the `conduit` binary.

pub mod checkpoint;
pub mod poll;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Reconcile pipeline-completion webhooks and polling into one event stream.
#[derive(Parser)]
#[command(name = "conduit", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server and the polling loop for every configured trigger.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Export spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Run a single poll cycle for a trigger and print the outcome.
    Poll {
        /// Trigger ID from config.toml.
        trigger_id: String,

        /// Work on an in-memory copy of the checkpoint; nothing is persisted.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the stored checkpoint for a trigger.
    Checkpoint {
        /// Trigger ID from config.toml.
        trigger_id: String,
    },

    /// List configured triggers and their watermarks.
    #[command(alias = "ls")]
    Triggers,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Default tracing filter for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,conduit_core=debug,conduit_infra=debug,conduit=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_poll_dry_run_flag() {
        let cli = Cli::try_parse_from(["conduit", "poll", "deploy-prod", "--dry-run", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Poll {
                trigger_id,
                dry_run,
            } => {
                assert_eq!(trigger_id, "deploy-prod");
                assert!(dry_run);
            }
            _ => panic!("expected poll"),
        }
    }

    #[test]
    fn test_quiet_filter() {
        let cli = Cli::try_parse_from(["conduit", "--quiet", "triggers"]).unwrap();
        assert_eq!(cli.log_filter(), "error");
    }
}
