//! Broker integrations.
//!
//! [`PaperBroker`] simulates fills for backtests and dry runs.
//! [`KiteBroker`] talks to the Kite Connect REST API for live trading and
//! doubles as the live [`DataSource`](oi_core::DataSource) for bars with
//! open interest.

mod kite;
mod paper;

pub use kite::{parse_instrument_master, KiteBroker, KiteConfig};
pub use paper::{FillMode, PaperBroker};
