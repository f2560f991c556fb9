//! Position and risk bookkeeping.
//!
//! Turns raw signals into order intents for one instrument, enforcing
//! one position at a time, stop-loss and take-profit bands, and a daily
//! cap on entries.

mod limits;
mod state_machine;
mod stop_loss;

pub use limits::RiskCounters;
pub use state_machine::{
    ClosedTrade, FillOutcome, MachineState, OrderIntent, PositionStateMachine, RiskConfig,
    RiskDecision,
};
pub use stop_loss::ExitBands;
