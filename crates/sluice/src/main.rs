//! Sluice - Durable, backpressure-aware log ingestion
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline (default)
//! sluice
//! sluice --config configs/sluice.toml
//!
//! # Inspect the journal of a stopped instance
//! sluice journal inspect --config configs/sluice.toml
//! sluice journal read --from 100 --limit 20
//! ```

mod cmd;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sluice_config::{Config, LogConfig, LogFormat, LogOutput};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Sluice - Durable, backpressure-aware log ingestion
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline
    Serve(cmd::serve::ServeArgs),

    /// Inspect or dump the journal
    Journal(cmd::journal::JournalArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(mut args)) => {
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            init_logging(cli.log_level.as_deref(), args.config.as_deref())?;
            cmd::serve::run(args).await
        }
        Some(Command::Journal(args)) => {
            // Journal commands print to stdout; only warnings go to the log
            init_logging(Some(cli.log_level.as_deref().unwrap_or("warn")), None)?;
            cmd::journal::run(args, cli.config.as_deref())
        }
        // No subcommand = run the pipeline
        None => {
            init_logging(cli.log_level.as_deref(), cli.config.as_deref())?;
            let args = cmd::serve::ServeArgs { config: cli.config };
            cmd::serve::run(args).await
        }
    }
}

/// Logging settings from the config file, if one is given and readable
fn load_log_config(config_path: Option<&Path>) -> LogConfig {
    if let Some(path) = config_path
        && path.exists()
        && let Ok(config) = Config::from_file(path)
    {
        return config.log;
    }
    LogConfig::default()
}

/// Initialize the tracing subscriber
///
/// Level: CLI flag > config file > "info". `RUST_LOG` directives are not
/// consulted; the level string itself may hold directives
/// (`info,sluice_journal=debug`).
fn init_logging(cli_level: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let log = load_log_config(config_path);
    let level = cli_level.unwrap_or(log.level.as_str());

    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);

    match (log.format, log.output) {
        (LogFormat::Console, LogOutput::Stdout) => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        (LogFormat::Console, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}
