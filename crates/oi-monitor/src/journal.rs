//! Structured trade journal.
//!
//! Every trading occurrence is one event under the `trades` target, so a
//! filter like `RUST_LOG=trades=info` isolates the trade log.

use oi_core::types::{Fill, Order, Signal, SignalType};
use oi_risk::ClosedTrade;
use rust_decimal::Decimal;
use std::fmt::Display;
use tracing::{debug, error, info, warn};

pub const TRADES_TARGET: &str = "trades";

/// Emits trade events and keeps running totals for the session.
#[derive(Debug, Default, Clone)]
pub struct TradeJournal {
    closed_trades: u64,
    wins: u64,
    net_pnl: Decimal,
    total_commission: Decimal,
    suppressed: u64,
}

impl TradeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed_trades(&self) -> u64 {
        self.closed_trades
    }

    pub fn wins(&self) -> u64 {
        self.wins
    }

    pub fn net_pnl(&self) -> Decimal {
        self.net_pnl
    }

    pub fn total_commission(&self) -> Decimal {
        self.total_commission
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Market data observed for an instrument.
    pub fn tick(&self, symbol: &str, close: f64, open_interest: u64) {
        debug!(target: TRADES_TARGET, symbol, close, open_interest, "Tick");
    }

    /// A BUY or SELL signal. HOLDs are not journaled.
    pub fn signal(&self, signal: &Signal) {
        if signal.signal_type == SignalType::Hold {
            return;
        }
        info!(
            target: TRADES_TARGET,
            symbol = %signal.symbol,
            signal = %signal.signal_type,
            price = signal.price,
            reason = %signal.reason,
            "Signal"
        );
    }

    pub fn order_submitted(&self, order: &Order) {
        info!(
            target: TRADES_TARGET,
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            order_id = %order.id,
            "Order submitted"
        );
    }

    pub fn execution(&self, symbol: &str, fill: &Fill) {
        info!(
            target: TRADES_TARGET,
            symbol,
            order_id = %fill.order_id,
            quantity = %fill.quantity,
            price = %fill.price,
            commission = %fill.commission,
            "Execution"
        );
    }

    pub fn order_failed(&self, order: &Order) {
        warn!(
            target: TRADES_TARGET,
            symbol = %order.symbol,
            side = %order.side,
            order_id = %order.id,
            status = ?order.status,
            detail = order.status_message.as_deref().unwrap_or(""),
            "Order failed"
        );
    }

    /// A completed round trip. Updates the running totals.
    pub fn trade_closed(&mut self, trade: &ClosedTrade) {
        self.closed_trades += 1;
        if trade.is_win() {
            self.wins += 1;
        }
        self.net_pnl += trade.net_pnl();
        self.total_commission += trade.commission;

        info!(
            target: TRADES_TARGET,
            trade = self.closed_trades,
            symbol = %trade.symbol,
            entry = %trade.entry_price,
            exit = %trade.exit_price,
            pnl = %trade.pnl,
            commission = %trade.commission,
            held_secs = trade.holding_period().num_seconds(),
            reason = %trade.exit_reason,
            running_pnl = %self.net_pnl,
            "Trade closed"
        );
    }

    /// A BUY turned away by a risk limit.
    pub fn suppressed_entry(&mut self, symbol: &str, reason: &str) {
        self.suppressed += 1;
        warn!(target: TRADES_TARGET, symbol, reason, "Entry suppressed");
    }

    pub fn instrument_error(&self, symbol: &str, err: &dyn Display) {
        error!(target: TRADES_TARGET, symbol, error = %err, "Instrument cycle failed");
    }
}
