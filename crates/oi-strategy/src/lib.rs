//! Threshold signal evaluator.
//!
//! Classifies each bar as BUY, SELL or HOLD from the open-interest
//! derivatives and the current position state:
//!
//! | State | Condition | Signal |
//! |---|---|---|
//! | FLAT | `doi < 0 && d2oi < entry` | BUY |
//! | LONG | `doi > exit_doi` | SELL, first derivative exit |
//! | LONG | `d2oi > exit_d2oi` | SELL, second derivative exit |
//! | any | otherwise | HOLD |

mod evaluator;
mod oi_derivative;
mod params;
mod strikes;

pub use evaluator::{classify_entry, classify_exit, evaluate, Decision};
pub use oi_derivative::{OiDerivativeConfig, OiDerivativeStrategy};
pub use params::{SignalParams, ThresholdMode, Thresholds};
pub use strikes::{days_to_expiry, select_strikes, DteWindow, MovementType, StrikeSelector};
