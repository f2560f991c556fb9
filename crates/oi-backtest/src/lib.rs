//! Backtest and analysis drivers.
//!
//! [`BacktestEngine`] replays a bar history through the strategy, the
//! position state machine and a paper broker. [`SignalAnalyzer`] reports
//! on the signal itself without trading.

mod analysis;
mod engine;
mod report;
mod statistics;

pub use analysis::{AnalysisReport, RegimeStats, SignalAnalyzer};
pub use engine::{BacktestConfig, BacktestEngine, SignalRecord};
pub use report::BacktestReport;
pub use statistics::BacktestStats;
