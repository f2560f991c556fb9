//! Option contract selection command.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use oi_broker::{parse_instrument_master, KiteBroker};
use oi_config::AppConfig;
use oi_core::types::InstrumentMaster;

use crate::cli::StrikesArgs;

async fn load_master(args: &StrikesArgs, config: &AppConfig) -> Result<InstrumentMaster> {
    match &args.master {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(parse_instrument_master(&body)?)
        }
        None if config.broker.has_credentials() => {
            let kite = KiteBroker::new(super::kite_config(config)).context("Failed to create Kite client")?;
            Ok(kite.instruments(None).await?)
        }
        None => anyhow::bail!("No broker credentials: pass --master <instruments.csv>"),
    }
}

pub async fn run(args: StrikesArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let today = match args.date {
        Some(date) => date,
        None => config.session.window()?.session_date(Utc::now()),
    };
    let master = load_master(&args, &config).await?;
    let selector = config.selection.selector();
    info!(
        underlying = %selector.underlying,
        movement = ?selector.movement,
        spot = args.spot,
        %today,
        contracts = master.len(),
        "Selecting strikes"
    );

    let Some(expiry) = selector.expiry(&master, today) else {
        anyhow::bail!(
            "No {} expiry within {}-{} days of {today}",
            selector.underlying,
            selector.dte.min,
            selector.dte.max
        );
    };
    let picked = selector.select(&master, args.spot, today);

    println!("# {} expiry {expiry}, spot {}", selector.underlying, args.spot);
    for contract in &picked {
        println!();
        println!("[[instruments]]");
        println!("symbol = \"{}\"", contract.symbol);
        println!("instrument_token = {}", contract.instrument_token);
        println!("exchange = \"{}\"", contract.exchange);
        println!("lot_size = {}", contract.lot_size);
    }
    Ok(())
}
