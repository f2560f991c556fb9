//! Live polling driver.
//!
//! - [`LiveTrader`]: one polling cycle over every configured instrument
//! - [`LiveTrader::run`]: session-aware loop on an aligned wall-clock grid
//! - [`shutdown_channel`] / [`spawn_ctrl_c`]: cooperative shutdown

mod runner;
mod trader;

pub use runner::{shutdown_channel, spawn_ctrl_c};
pub use trader::{CycleReport, LiveConfig, LiveInstrument, LiveTrader};
