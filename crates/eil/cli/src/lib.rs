//! eil - developer CLI for the Energy Intelligence Layer
//!
//! - `eil replay <file>`: run a JSON-lines stream of energy maps through one
//!   layer and print one decision per line
//! - `eil config`: print the effective configuration as TOML

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use eil_core::EilConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::replay;

/// EIL CLI application
#[derive(Parser)]
#[command(name = "eil")]
#[command(about = "Energy Intelligence Layer - regime fusion replay tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "EIL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of energy maps ("-" reads stdin)
    Replay(replay::ReplayArgs),

    /// Show the effective configuration
    Config,
}

/// Run using the current process arguments.
pub fn run() -> anyhow::Result<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Logs go to stderr so stdout stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Replay(args) => replay::execute(args, config),
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EilConfig> {
    match path {
        Some(path) => EilConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EilConfig::default()),
    }
}
