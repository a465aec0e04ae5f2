//! CLI command definitions for the `flowline` binary.

pub mod inspect;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run and inspect agent workflows.
#[derive(Parser)]
#[command(name = "flowline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to flowline.toml (defaults to $FLOWLINE_HOME/flowline.toml).
    #[arg(long, global = true, env = "FLOWLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a workflow definition.
    Validate {
        /// Workflow file (.yaml, .yml or .json).
        file: PathBuf,
    },

    /// Execute a workflow.
    Run(run::RunArgs),

    /// Render a persisted step event log.
    Inspect {
        /// JSONL file written by `run --events`.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["flowline", "validate", "wf.yaml", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }

    #[test]
    fn run_input_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "flowline", "run", "wf.yaml", "--input", "{}", "--input-file", "in.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn resume_data_requires_resume_step() {
        let parsed = Cli::try_parse_from(["flowline", "run", "wf.yaml", "--resume-data", "{}"]);
        assert!(parsed.is_err());
    }
}
