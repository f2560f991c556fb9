//! Short-covering strategy on open-interest derivatives.
//!
//! Buys when open interest is falling at an accelerating rate and exits
//! once the decline slows or reverses.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use oi_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState},
    types::{Bar, DerivativeSample, PositionState, Signal, SignalType},
};
use oi_indicators::{DerivativeConfig, DerivativeEngine};

use crate::evaluator::evaluate;
use crate::params::SignalParams;

/// Configuration for [`OiDerivativeStrategy`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OiDerivativeConfig {
    pub derivative: DerivativeConfig,
    pub params: SignalParams,
}

impl StrategyConfig for OiDerivativeConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        self.derivative
            .validate()
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
        self.params.validate()
    }
}

/// Streaming strategy for one instrument.
pub struct OiDerivativeStrategy {
    symbol: String,
    config: OiDerivativeConfig,
    engine: DerivativeEngine,
    last_sample: Option<DerivativeSample>,
    bars_processed: usize,
    signals_generated: usize,
}

impl OiDerivativeStrategy {
    pub fn new(symbol: impl Into<String>, config: OiDerivativeConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let engine = DerivativeEngine::new(config.derivative)
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            symbol: symbol.into(),
            config,
            engine,
            last_sample: None,
            bars_processed: 0,
            signals_generated: 0,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &OiDerivativeConfig {
        &self.config
    }

    /// Sample computed for the most recent accepted bar.
    pub fn last_sample(&self) -> Option<&DerivativeSample> {
        self.last_sample.as_ref()
    }
}

impl Strategy for OiDerivativeStrategy {
    fn name(&self) -> &str {
        "OI Derivative"
    }

    fn on_bar(&mut self, bar: &Bar, position: PositionState) -> Signal {
        self.bars_processed += 1;

        let sample = match self.engine.update(bar) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(symbol = %self.symbol, timestamp = bar.timestamp, error = %e, "Bar skipped");
                return Signal::hold(&self.symbol, bar, format!("bar skipped: {e}"));
            }
        };
        self.last_sample = Some(sample);

        let decision = evaluate(&sample, position, &self.config.params);
        debug!(
            symbol = %self.symbol,
            oi = sample.open_interest,
            doi = sample.doi,
            d2oi = sample.d2oi,
            oi_ma = sample.oi_moving_average,
            signal = %decision.signal_type,
            "Evaluated bar"
        );

        match (decision.signal_type, decision.exit_reason) {
            (SignalType::Sell, Some(exit)) => {
                self.signals_generated += 1;
                Signal::sell(&self.symbol, bar, exit)
            }
            (SignalType::Buy, _) => {
                self.signals_generated += 1;
                Signal::buy(&self.symbol, bar, decision.reason)
            }
            _ => Signal::hold(&self.symbol, bar, decision.reason),
        }
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.last_sample = None;
        self.bars_processed = 0;
        self.signals_generated = 0;
    }

    fn state(&self) -> StrategyState {
        let mut state = StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.engine.bars_seen() >= self.warmup_period(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            ..Default::default()
        };
        if let Some(sample) = &self.last_sample {
            state.indicators.insert("doi".to_string(), sample.doi);
            state.indicators.insert("d2oi".to_string(), sample.d2oi);
            state.indicators.insert("oi_ma".to_string(), sample.oi_moving_average);
        }
        state
    }

    fn warmup_period(&self) -> usize {
        if self.config.params.needs_moving_average() {
            self.config.derivative.ma_window.max(3)
        } else {
            3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oi_core::types::ExitReason;

    fn bar(i: i64, oi: u64) -> Bar {
        Bar::new(i * 180_000, 100.0, 101.0, 99.0, 100.0, 10, oi)
    }

    fn strategy(window: usize) -> OiDerivativeStrategy {
        let config = OiDerivativeConfig {
            derivative: DerivativeConfig::new(3.0, window),
            params: SignalParams::default(),
        };
        OiDerivativeStrategy::new("FINNIFTY24000CE", config).unwrap()
    }

    #[test]
    fn test_warmup_holds() {
        let mut s = strategy(5);
        for i in 0..4 {
            let signal = s.on_bar(&bar(i, 1_000_000 - i as u64 * 90_000), PositionState::Flat);
            assert!(signal.is_hold());
        }
        assert!(!s.state().is_warmed_up);
    }

    #[test]
    fn test_buy_then_second_derivative_exit() {
        let mut s = strategy(3);
        for i in 0..3 {
            s.on_bar(&bar(i, 1_000_000), PositionState::Flat);
        }
        // accelerating drop: d2oi = -60000/9
        let entry = s.on_bar(&bar(3, 940_000), PositionState::Flat);
        assert_eq!(entry.signal_type, SignalType::Buy);

        // decline keeps pace, d2oi back to zero
        let exit = s.on_bar(&bar(4, 880_000), PositionState::Long);
        assert_eq!(exit.signal_type, SignalType::Sell);
        assert_eq!(exit.exit_reason, Some(ExitReason::SecondDerivative));
        assert_eq!(s.state().signals_generated, 2);
    }

    #[test]
    fn test_out_of_order_bar_degrades_to_hold() {
        let mut s = strategy(3);
        s.on_bar(&bar(5, 1_000_000), PositionState::Flat);
        let signal = s.on_bar(&bar(4, 1_000_000), PositionState::Flat);

        assert!(signal.is_hold());
        assert!(signal.reason.starts_with("bar skipped"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OiDerivativeConfig {
            derivative: DerivativeConfig::new(-3.0, 30),
            params: SignalParams::default(),
        };
        assert!(OiDerivativeStrategy::new("X", config).is_err());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut s = strategy(3);
        for i in 0..4 {
            s.on_bar(&bar(i, 1_000_000), PositionState::Flat);
        }
        s.reset();
        assert_eq!(s.state().bars_processed, 0);
        assert!(s.last_sample().is_none());
        assert!(s.on_bar(&bar(0, 1), PositionState::Flat).is_hold());
    }
}
