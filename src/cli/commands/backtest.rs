//! Backtest command implementation.

use anyhow::{Context, Result};
use oi_backtest::{BacktestConfig, BacktestEngine};
use oi_config::AppConfig;
use tracing::info;

use crate::cli::{BacktestArgs, OutputFormat};

pub async fn run(args: BacktestArgs, mut config: AppConfig) -> Result<()> {
    args.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let bars = super::load_bars(&args.data, &config, args.resample)?;

    let backtest_config = BacktestConfig {
        symbol: args.symbol.clone(),
        initial_capital: args.cash.unwrap_or(config.backtest.initial_cash),
        commission_pct: args.commission.unwrap_or(config.backtest.commission_pct),
        strategy: config.strategy_config(),
        risk: config.risk_config(args.lot_size),
    };
    info!(symbol = %args.symbol, mode = ?config.strategy.mode, "Starting backtest");

    let engine = BacktestEngine::new(backtest_config).context("Invalid backtest configuration")?;
    let report = engine.run(&bars).await?;

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        report.save(save_path)?;
        info!("Results saved to {:?}", save_path);
    }

    Ok(())
}
