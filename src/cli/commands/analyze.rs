//! Analyze command implementation.

use anyhow::{Context, Result};
use oi_backtest::SignalAnalyzer;
use oi_config::AppConfig;
use oi_data::synthetic::{market_regimes, RegimeConfig, ShortCoveringScenario};
use tracing::info;

use crate::cli::{AnalyzeArgs, OutputFormat, SyntheticKind};

pub async fn run(args: AnalyzeArgs, mut config: AppConfig) -> Result<()> {
    args.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let bars = match (&args.data, args.synthetic) {
        (Some(path), _) => super::load_bars(path, &config, args.resample)?,
        (None, Some(SyntheticKind::Regimes)) => market_regimes(&RegimeConfig {
            seed: args.seed,
            ..RegimeConfig::default()
        }),
        (None, Some(SyntheticKind::ShortCovering)) => ShortCoveringScenario::default().generate(),
        (None, None) => anyhow::bail!("Provide --data <file> or --synthetic <kind>"),
    };
    info!(bars = bars.len(), "Analyzing signal");

    let analyzer = SignalAnalyzer::new(config.strategy_config())?;
    let report = analyzer.analyze(&bars)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", report.summary()),
    }
    Ok(())
}
