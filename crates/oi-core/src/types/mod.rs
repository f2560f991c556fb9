//! Core data types for the signal engine.

mod instrument;
mod ohlcv;
mod order;
mod position;
mod sample;
mod session;
mod signal;
mod timeframe;

pub use instrument::{Instrument, InstrumentInfo, InstrumentMaster, OptionKind};
pub use ohlcv::{Bar, BarSeries};
pub use order::{Fill, Order, OrderRequest, OrderStatus, OrderType, Product, Side};
pub use position::{Portfolio, Position};
pub use sample::DerivativeSample;
pub use session::SessionWindow;
pub use signal::{ExitReason, PositionState, Signal, SignalType};
pub use timeframe::Timeframe;
