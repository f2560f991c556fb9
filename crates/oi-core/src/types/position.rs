//! Long-only positions and the cash ledger that holds them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Side;

/// An open long position in one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub current_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        quantity: Decimal,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price: entry_price,
            current_price: entry_price,
            entry_time,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.avg_entry_price) * self.quantity
    }

    /// Apply a fill. Sells never take the position below zero.
    ///
    /// Returns the realized P&L of the sold quantity.
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        match side {
            Side::Buy => {
                let total = self.quantity + quantity;
                if total > Decimal::ZERO {
                    self.avg_entry_price =
                        (self.avg_entry_price * self.quantity + price * quantity) / total;
                }
                self.quantity = total;
                self.current_price = price;
                Decimal::ZERO
            }
            Side::Sell => {
                let closed = quantity.min(self.quantity);
                let realized = (price - self.avg_entry_price) * closed;
                self.quantity -= closed;
                self.current_price = price;
                self.realized_pnl += realized;
                realized
            }
        }
    }
}

/// Cash plus open positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: HashMap<String, Position>,
    pub total_realized_pnl: Decimal,
    pub total_commission: Decimal,
    pub initial_capital: Decimal,
    pub peak_equity: Decimal,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            positions: HashMap::new(),
            total_realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            initial_capital,
            peak_equity: initial_capital,
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Cash plus the market value of open positions.
    pub fn equity(&self) -> Decimal {
        self.cash + self.positions.values().map(Position::market_value).sum::<Decimal>()
    }

    /// Book an execution. Returns realized P&L, which is zero for buys.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
        at: DateTime<Utc>,
    ) -> Decimal {
        let value = quantity * price;
        self.total_commission += commission;

        let realized = match side {
            Side::Buy => {
                self.cash -= value + commission;
                self.positions
                    .entry(symbol.to_string())
                    .or_insert_with(|| Position::new(symbol, Decimal::ZERO, price, at))
                    .apply_fill(Side::Buy, quantity, price)
            }
            Side::Sell => {
                self.cash += value - commission;
                let realized = self
                    .positions
                    .get_mut(symbol)
                    .map(|p| p.apply_fill(Side::Sell, quantity, price))
                    .unwrap_or(Decimal::ZERO);
                if self.positions.get(symbol).is_some_and(Position::is_flat) {
                    self.positions.remove(symbol);
                }
                realized
            }
        };

        self.total_realized_pnl += realized;
        self.mark_peak();
        realized
    }

    /// Mark one instrument to a new price.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.current_price = price;
        }
        self.mark_peak();
    }

    fn mark_peak(&mut self) {
        let equity = self.equity();
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
    }

    /// Current drawdown from peak, in percent.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity == Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity()) / self.peak_equity * Decimal::from(100)
    }

    /// Total return, in percent.
    pub fn total_return(&self) -> Decimal {
        if self.initial_capital == Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.equity() - self.initial_capital) / self.initial_capital * Decimal::from(100)
    }
}
