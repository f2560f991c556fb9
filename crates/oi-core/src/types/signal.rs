//! Signal types produced by the threshold evaluator.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Bar;

/// Whether the strategy holds a position in an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

/// Signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// Why a long position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    FirstDerivative,
    SecondDerivative,
    StopLoss,
    TakeProfit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::FirstDerivative => "first derivative exit",
            ExitReason::SecondDerivative => "second derivative exit",
            ExitReason::StopLoss => "STOP LOSS",
            ExitReason::TakeProfit => "TAKE PROFIT",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A BUY / SELL / HOLD decision for one bar of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub signal_type: SignalType,
    /// Close price of the bar the signal was evaluated on
    pub price: f64,
    pub timestamp: i64,
    pub reason: String,
    /// Set on SELL signals
    pub exit_reason: Option<ExitReason>,
}

impl Signal {
    pub fn buy(symbol: impl Into<String>, bar: &Bar, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type: SignalType::Buy,
            price: bar.close,
            timestamp: bar.timestamp,
            reason: reason.into(),
            exit_reason: None,
        }
    }

    pub fn sell(symbol: impl Into<String>, bar: &Bar, exit: ExitReason) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type: SignalType::Sell,
            price: bar.close,
            timestamp: bar.timestamp,
            reason: exit.as_str().to_string(),
            exit_reason: Some(exit),
        }
    }

    pub fn hold(symbol: impl Into<String>, bar: &Bar, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type: SignalType::Hold,
            price: bar.close,
            timestamp: bar.timestamp,
            reason: reason.into(),
            exit_reason: None,
        }
    }

    #[inline]
    pub fn is_hold(&self) -> bool {
        self.signal_type == SignalType::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_reason_strings() {
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP LOSS");
        assert_eq!(ExitReason::TakeProfit.to_string(), "TAKE PROFIT");
        assert_eq!(ExitReason::FirstDerivative.to_string(), "first derivative exit");
    }

    #[test]
    fn test_sell_signal_carries_exit_reason() {
        let bar = Bar::new(1, 100.0, 101.0, 99.0, 100.5, 10, 1000);
        let signal = Signal::sell("X", &bar, ExitReason::SecondDerivative);

        assert_eq!(signal.signal_type, SignalType::Sell);
        assert_eq!(signal.reason, "second derivative exit");
        assert_eq!(signal.exit_reason, Some(ExitReason::SecondDerivative));
        assert_eq!(signal.price, 100.5);
    }
}
