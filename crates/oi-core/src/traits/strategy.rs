//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{Bar, PositionState, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Strategy snapshot for monitoring and reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub name: String,
    pub is_warmed_up: bool,
    pub bars_processed: usize,
    pub signals_generated: usize,
    /// Latest indicator values by name
    pub indicators: HashMap<String, f64>,
}

/// A per-instrument signal generator.
///
/// A strategy sees every bar of one instrument in timestamp order and
/// classifies it as BUY, SELL or HOLD given the current position state.
/// It never fails: errors degrade to HOLD with the error as the reason.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Process the next bar.
    fn on_bar(&mut self, bar: &Bar, position: PositionState) -> Signal;

    /// Clear all accumulated history.
    fn reset(&mut self);

    fn state(&self) -> StrategyState;

    /// Bars needed before every input of the decision is defined.
    fn warmup_period(&self) -> usize;
}
