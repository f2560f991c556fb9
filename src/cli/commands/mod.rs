//! CLI command implementations.

pub mod analyze;
pub mod backtest;
pub mod generate;
pub mod live;
pub mod strikes;
pub mod validate;

use anyhow::{Context, Result};
use oi_broker::KiteConfig;
use oi_config::AppConfig;
use oi_core::types::Bar;
use oi_data::{aggregate_to_cadence, load_csv, CsvOptions};
use std::path::Path;
use tracing::info;

/// Kite client settings from the `[broker]` and `[session]` sections.
pub fn kite_config(config: &AppConfig) -> KiteConfig {
    let b = &config.broker;
    KiteConfig::new(&b.api_key, &b.access_token)
        .with_base_url(&b.base_url)
        .with_exchange(&b.exchange)
        .with_product(b.product)
        .with_utc_offset_minutes(config.session.utc_offset_minutes)
}

/// CSV reading rules from the `[data]` and `[session]` sections.
pub fn csv_options(config: &AppConfig) -> CsvOptions {
    CsvOptions {
        timestamp_format: config.data.timestamp_format.clone(),
        has_headers: config.data.has_headers,
        utc_offset_minutes: config.session.utc_offset_minutes,
    }
}

/// Load a bar file, aggregating to `resample` minutes (or the configured
/// cadence) when set.
pub fn load_bars(path: &Path, config: &AppConfig, resample: Option<u32>) -> Result<Vec<Bar>> {
    if !path.exists() {
        anyhow::bail!(
            "Data file '{}' does not exist. Generate one with `oi-trader generate --output {}`",
            path.display(),
            path.display()
        );
    }
    let bars = load_csv(path, &csv_options(config))
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let bars = match resample.or(config.data.resample_minutes) {
        Some(minutes) => {
            let aggregated = aggregate_to_cadence(&bars, minutes);
            info!(from = bars.len(), to = aggregated.len(), minutes, "Aggregated bars");
            aggregated
        }
        None => bars,
    };
    info!(bars = bars.len(), path = %path.display(), "Loaded bars");
    Ok(bars)
}
