//! Generate command implementation.

use anyhow::{Context, Result};
use oi_config::AppConfig;
use oi_data::synthetic::{market_regimes, RegimeConfig, ShortCoveringScenario};
use oi_data::write_bars;
use std::fs::File;
use tracing::info;

use crate::cli::{GenerateArgs, SyntheticKind};

pub fn run(args: GenerateArgs, config: &AppConfig) -> Result<()> {
    let bars = match args.kind {
        SyntheticKind::Regimes => market_regimes(&RegimeConfig {
            bars_per_regime: args.bars,
            seed: args.seed,
            ..RegimeConfig::default()
        }),
        SyntheticKind::ShortCovering => ShortCoveringScenario::default().generate(),
    };

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_bars(file, &bars, &super::csv_options(config))?;

    info!(bars = bars.len(), path = %args.output.display(), "Synthetic data written");
    println!("Wrote {} bars to {}", bars.len(), args.output.display());
    Ok(())
}
