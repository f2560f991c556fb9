//! Logging and the trade journal.

mod journal;
mod logging;

pub use journal::{TradeJournal, TRADES_TARGET};
pub use logging::setup_logging;
