//! Open-interest signal engine CLI.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use oi_config::{load_config, LogFormat};
use oi_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    let log_level = cli
        .log_level
        .as_ref()
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    // Held for the whole run so buffered file logs are flushed on exit.
    let _guard = setup_logging(&log_level, json, config.logging.file.as_deref());

    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, config).await,
        Commands::Analyze(args) => cli::commands::analyze::run(args, config).await,
        Commands::Live(args) => cli::commands::live::run(args, config).await,
        Commands::Generate(args) => cli::commands::generate::run(args, &config),
        Commands::Strikes(args) => cli::commands::strikes::run(args, config).await,
        Commands::ValidateConfig => cli::commands::validate::run(&config),
    }
}
