//! Live trading command implementation.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use oi_broker::{FillMode, KiteBroker, PaperBroker};
use oi_config::AppConfig;
use oi_core::traits::{Broker, DataSource};
use oi_data::CsvBarSource;
use oi_live::{shutdown_channel, spawn_ctrl_c, LiveConfig, LiveInstrument, LiveTrader};

use crate::cli::LiveArgs;

fn kite(config: &AppConfig) -> Result<Arc<KiteBroker>> {
    Ok(Arc::new(
        KiteBroker::new(super::kite_config(config)).context("Failed to create Kite client")?,
    ))
}

/// Check configured contracts against the instrument master, filling in
/// missing tokens and warning about contracts outside the expiry window.
async fn resolve_instruments(kite: &KiteBroker, config: &mut AppConfig) -> Result<()> {
    let master = kite.instruments(None).await.context("Failed to load instrument master")?;
    let today = config.session.window()?.session_date(Utc::now());
    let window = config.selection.dte_window();

    for instrument in &mut config.instruments {
        let dte = instrument.resolve(&master, today)?;
        match dte {
            Some(dte) if !window.contains(dte) => warn!(
                symbol = %instrument.symbol,
                dte,
                min_dte = window.min,
                max_dte = window.max,
                "Contract outside the expiry window"
            ),
            _ => info!(
                symbol = %instrument.symbol,
                token = instrument.instrument_token,
                dte = ?dte,
                "Instrument resolved"
            ),
        }
    }
    Ok(())
}

pub async fn run(args: LiveArgs, mut config: AppConfig) -> Result<()> {
    config.validate_live(args.dry_run).context("Invalid live configuration")?;

    let session = config.session.window()?;
    let timeframe = config.session.timeframe()?;

    if config.broker.has_credentials() {
        resolve_instruments(&*kite(&config)?, &mut config).await?;
    } else if config.instruments.iter().any(|i| i.instrument_token == 0) && args.data.is_none() {
        anyhow::bail!("Instruments without a token need broker credentials to resolve");
    }

    let data: Arc<dyn DataSource> = match &args.data {
        Some(path) => Arc::new(CsvBarSource::new(path, super::csv_options(&config))?),
        None if config.broker.has_credentials() => kite(&config)?,
        None => anyhow::bail!("Dry run without broker credentials needs --data <file>"),
    };

    let broker: Arc<dyn Broker> = if args.dry_run {
        let cash = args.cash.unwrap_or(config.backtest.initial_cash);
        info!(%cash, "Dry run: orders are simulated");
        Arc::new(
            PaperBroker::new(cash)
                .with_commission_pct(config.backtest.commission_pct)
                .with_fill_mode(FillMode::Immediate),
        )
    } else {
        warn!("Live mode: orders will be sent to the broker");
        kite(&config)?
    };

    let live_config = LiveConfig {
        strategy: config.strategy_config(),
        instruments: config
            .instruments
            .iter()
            .map(|i| LiveInstrument {
                instrument: i.to_instrument(),
                risk: config.risk_config(i.lot_size),
            })
            .collect(),
        timeframe,
        lookback_bars: config.session.history_lookback_bars,
        session,
        poll_interval: Duration::seconds(config.session.data_refresh_interval_seconds as i64),
        alignment_lag: Duration::seconds(config.session.alignment_lag_seconds as i64),
    };

    let (tx, rx) = shutdown_channel();
    spawn_ctrl_c(tx);

    let mut trader = LiveTrader::new(live_config, broker, data, rx)?;
    trader.run().await?;
    info!("Live session ended");
    Ok(())
}
