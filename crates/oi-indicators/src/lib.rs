//! Open-interest derivative engine.
//!
//! - [`compute_derivatives`]: pure function over an explicit bar window
//! - [`DerivativeEngine`]: streaming form, one instance per instrument
//! - Moving averages used for the trailing open-interest baseline

pub mod derivative;
pub mod moving_average;

pub use derivative::{compute_derivatives, compute_series, DerivativeConfig, DerivativeEngine};
pub use moving_average::{RollingMean, Sma};
