//! Traits at the seams between the decision core and its collaborators.

mod broker;
mod data_source;
mod indicator;
mod strategy;

pub use broker::Broker;
pub use data_source::DataSource;
pub use indicator::{Indicator, StreamingIndicator};
pub use strategy::{Strategy, StrategyConfig, StrategyState};
