//! Stop-loss and take-profit price bands.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use oi_core::types::ExitReason;

/// Fixed-percentage exit bands around the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitBands {
    /// Fraction below entry that stops the position out, e.g. 0.15
    pub stop_loss_pct: Decimal,
    /// Fraction above entry that takes profit, e.g. 0.30
    pub take_profit_pct: Decimal,
}

impl Default for ExitBands {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(0.15),
            take_profit_pct: dec!(0.30),
        }
    }
}

impl ExitBands {
    pub fn new(stop_loss_pct: Decimal, take_profit_pct: Decimal) -> Self {
        Self {
            stop_loss_pct,
            take_profit_pct,
        }
    }

    pub fn stop_price(&self, entry_price: Decimal) -> Decimal {
        entry_price * (Decimal::ONE - self.stop_loss_pct)
    }

    pub fn target_price(&self, entry_price: Decimal) -> Decimal {
        entry_price * (Decimal::ONE + self.take_profit_pct)
    }

    /// Which band, if any, `current_price` has crossed. Stop-loss wins.
    pub fn check(&self, entry_price: Decimal, current_price: Decimal) -> Option<ExitReason> {
        if current_price <= self.stop_price(entry_price) {
            Some(ExitReason::StopLoss)
        } else if current_price >= self.target_price(entry_price) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_loss_band() {
        let bands = ExitBands::default();
        assert_eq!(bands.stop_price(dec!(100)), dec!(85));
        assert_eq!(bands.check(dec!(100), dec!(85)), Some(ExitReason::StopLoss));
        assert_eq!(bands.check(dec!(100), dec!(60)), Some(ExitReason::StopLoss));
        assert_eq!(bands.check(dec!(100), dec!(85.01)), None);
    }

    #[test]
    fn test_take_profit_band() {
        let bands = ExitBands::default();
        assert_eq!(bands.target_price(dec!(100)), dec!(130));
        assert_eq!(bands.check(dec!(100), dec!(130)), Some(ExitReason::TakeProfit));
        assert_eq!(bands.check(dec!(100), dec!(200)), Some(ExitReason::TakeProfit));
        assert_eq!(bands.check(dec!(100), dec!(129.99)), None);
    }

    #[test]
    fn test_degenerate_bands_prefer_stop_loss() {
        let bands = ExitBands::new(dec!(0), dec!(0));
        assert_eq!(bands.check(dec!(100), dec!(100)), Some(ExitReason::StopLoss));
    }
}
