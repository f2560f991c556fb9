//! Validate configuration command.

use anyhow::Result;
use oi_config::{to_toml, AppConfig};

pub fn run(config: &AppConfig) -> Result<()> {
    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("Threshold mode: {:?}", config.strategy.mode);
    println!("Instruments: {}", config.instruments.len());
    println!("Broker credentials: {}", if config.broker.has_credentials() { "set" } else { "missing" });
    println!();
    println!("{}", to_toml(config)?);
    Ok(())
}
