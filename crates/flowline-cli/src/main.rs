//! Flowline command-line entry point.
//!
//! Binary name: `flowline`
//!
//! Parses arguments, sets up tracing, loads `flowline.toml` and dispatches
//! to the command handlers.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use flowline_infra::config::{default_config_path, load_config};
use flowline_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,flowline=debug",
        _ => "trace",
    };
    if let Err(e) = init_tracing(filter, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowline", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path).await;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let code = match cli.command {
        Commands::Validate { file } => {
            cli::validate::validate(&file, cli.json, cli.quiet)?;
            ExitCode::SUCCESS
        }
        Commands::Run(args) => {
            let status = cli::run::run(args, &config, cli.json, cli.quiet).await?;
            cli::run::exit_code(status)
        }
        Commands::Inspect { file } => {
            cli::inspect::inspect(&file, cli.json).await?;
            ExitCode::SUCCESS
        }
        Commands::Completions { .. } => ExitCode::SUCCESS,
    };

    shutdown_tracing();
    Ok(code)
}
