//! Backtest statistics.

use num_traits::ToPrimitive;
use oi_core::types::Position;
use oi_risk::ClosedTrade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    /// Starting portfolio value
    pub initial_capital: Decimal,
    /// Cash plus any open position marked at the last close
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Per-bar returns, annualised with 252
    pub sharpe_ratio: f64,
    /// Closed round trips
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    /// Average net profit per winning trade
    pub avg_win: Decimal,
    /// Average net loss per losing trade, as a positive number
    pub avg_loss: Decimal,
    /// Gross net profit over gross net loss; zero without losses
    pub profit_factor: Decimal,
    /// Sum of `(exit - entry) * quantity` over closed trades
    pub gross_pnl: Decimal,
    pub total_commission: Decimal,
    /// Entries turned away by the daily trade cap
    pub suppressed_entries: usize,
    pub exit_reasons: BTreeMap<String, usize>,
    /// Position still open when the data ended
    pub open_position: Option<Position>,
    pub bars_processed: usize,
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<ClosedTrade>,
    #[serde(skip)]
    peak_equity: Decimal,
    #[serde(skip)]
    returns: Vec<f64>,
}

impl BacktestStats {
    /// Create new stats tracker.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            gross_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            suppressed_entries: 0,
            exit_reasons: BTreeMap::new(),
            open_position: None,
            bars_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
            returns: Vec::new(),
        }
    }

    /// Record equity at a timestamp.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        if let Some((_, prev_equity)) = self.equity_curve.last() {
            if *prev_equity > Decimal::ZERO {
                let ret = ((equity - *prev_equity) / *prev_equity).to_f64().unwrap_or(0.0);
                self.returns.push(ret);
            }
        }

        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }

        self.bars_processed += 1;
    }

    pub fn add_trade(&mut self, trade: ClosedTrade) {
        *self
            .exit_reasons
            .entry(trade.exit_reason.as_str().to_string())
            .or_insert(0) += 1;
        self.trades.push(trade);
        self.total_trades += 1;
    }

    pub fn record_suppressed(&mut self) {
        self.suppressed_entries += 1;
    }

    /// Calculate final statistics.
    pub fn finalize(&mut self, final_equity: Decimal, open_position: Option<Position>) {
        self.final_equity = final_equity;
        self.open_position = open_position;

        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_equity - self.initial_capital) / self.initial_capital * dec!(100);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        self.winning_trades = 0;
        self.losing_trades = 0;
        self.gross_pnl = Decimal::ZERO;
        self.total_commission = Decimal::ZERO;

        for trade in &self.trades {
            self.gross_pnl += trade.pnl;
            self.total_commission += trade.commission;
            let net = trade.net_pnl();
            if net > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += net;
            } else if net < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += net.abs();
            }
        }

        if self.total_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.total_trades);
        }
        if self.winning_trades > 0 {
            self.avg_win = total_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = total_loss / Decimal::from(self.losing_trades);
        }
        if total_loss > Decimal::ZERO {
            self.profit_factor = total_profit / total_loss;
        }

        if !self.returns.is_empty() {
            let n = self.returns.len() as f64;
            let mean = self.returns.iter().sum::<f64>() / n;
            let variance = self.returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();
            if std_dev > 0.0 {
                self.sharpe_ratio = mean * 252.0_f64.sqrt() / std_dev;
            }
        }
    }

    /// Net PnL over closed trades.
    pub fn net_pnl(&self) -> Decimal {
        self.gross_pnl - self.total_commission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use oi_core::types::ExitReason;

    fn trade(pnl: Decimal, commission: Decimal, exit_reason: ExitReason) -> ClosedTrade {
        let entry_time = Utc.with_ymd_and_hms(2024, 7, 1, 4, 0, 0).unwrap();
        ClosedTrade {
            symbol: "X".to_string(),
            quantity: dec!(25),
            entry_price: dec!(100),
            exit_price: dec!(100) + pnl / dec!(25),
            entry_time,
            exit_time: entry_time + Duration::minutes(6),
            pnl,
            commission,
            exit_reason,
        }
    }

    #[test]
    fn test_trade_statistics() {
        let mut stats = BacktestStats::new(dec!(100000));
        stats.add_trade(trade(dec!(300), dec!(5), ExitReason::TakeProfit));
        stats.add_trade(trade(dec!(-100), dec!(5), ExitReason::StopLoss));
        stats.add_trade(trade(dec!(50), dec!(5), ExitReason::FirstDerivative));
        stats.finalize(dec!(100235), None);

        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.avg_win, dec!(170));
        assert_eq!(stats.avg_loss, dec!(105));
        assert_eq!(stats.profit_factor, dec!(340) / dec!(105));
        assert_eq!(stats.net_pnl(), dec!(235));
        assert_eq!(stats.exit_reasons.get("STOP LOSS"), Some(&1));
        assert_eq!(stats.total_return_pct, dec!(0.235));
    }

    #[test]
    fn test_drawdown_tracking() {
        let mut stats = BacktestStats::new(dec!(1000));
        stats.record_equity(0, dec!(1000));
        stats.record_equity(1, dec!(1200));
        stats.record_equity(2, dec!(900));
        stats.record_equity(3, dec!(1100));

        assert_eq!(stats.max_drawdown_pct, dec!(25));
        assert_eq!(stats.bars_processed, 4);
    }

    #[test]
    fn test_flat_equity_has_zero_sharpe() {
        let mut stats = BacktestStats::new(dec!(1000));
        for i in 0..10 {
            stats.record_equity(i, dec!(1000));
        }
        stats.finalize(dec!(1000), None);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.win_rate_pct, Decimal::ZERO);
    }
}
