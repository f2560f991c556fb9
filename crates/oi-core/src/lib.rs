//! Core types and traits for the open-interest signal engine.
//!
//! This crate provides the shared building blocks:
//! - Market data types (Bar with open interest, BarSeries)
//! - Derivative samples, signals and position state
//! - Order, fill and position types
//! - Traits for brokers, data sources, indicators and strategies

pub mod error;
pub mod traits;
pub mod types;

pub use error::TradingError;
pub use traits::*;
pub use types::*;
