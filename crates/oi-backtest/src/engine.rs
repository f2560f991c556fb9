//! Backtesting engine.
//!
//! Bars are replayed one at a time. A market order placed on bar `i` fills
//! at the open of bar `i + 1`, so an order is always pending across one bar
//! boundary. Per bar:
//!
//! 1. fill the pending order at this bar's open
//! 2. mark the position to this bar's close
//! 3. evaluate the strategy, then the position state machine
//! 4. place any resulting order
//! 5. record equity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use oi_broker::PaperBroker;
use oi_core::error::{DataError, TradingError};
use oi_core::traits::{Broker, Strategy, StrategyConfig};
use oi_core::types::{Bar, Order, OrderStatus, Side, SignalType};
use oi_monitor::TradeJournal;
use oi_risk::{FillOutcome, PositionStateMachine, RiskConfig, RiskDecision};
use oi_strategy::{OiDerivativeConfig, OiDerivativeStrategy};

use crate::report::BacktestReport;
use crate::statistics::BacktestStats;

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Instrument name used in orders and logs
    pub symbol: String,
    pub initial_capital: Decimal,
    /// Commission as a fraction of traded value
    pub commission_pct: Decimal,
    pub strategy: OiDerivativeConfig,
    pub risk: RiskConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            symbol: "INSTRUMENT".to_string(),
            initial_capital: dec!(100000),
            commission_pct: dec!(0.001),
            strategy: OiDerivativeConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.commission_pct < Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "commission must be non-negative, got {}",
                self.commission_pct
            )));
        }
        self.strategy.validate()?;
        self.risk.validate()
    }
}

/// A non-HOLD decision taken during the replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub bar_index: usize,
    pub timestamp: i64,
    pub signal_type: SignalType,
    pub price: f64,
    pub reason: String,
    /// BUY turned away by the daily cap
    pub suppressed: bool,
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// Backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, TradingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run a backtest over a time-ordered bar history.
    pub async fn run(&self, bars: &[Bar]) -> Result<BacktestReport, TradingError> {
        if bars.is_empty() {
            return Err(DataError::NoDataAvailable.into());
        }

        let symbol = self.config.symbol.as_str();
        let broker = PaperBroker::new(self.config.initial_capital)
            .with_commission_pct(self.config.commission_pct);
        let mut strategy = OiDerivativeStrategy::new(symbol, self.config.strategy.clone())?;
        let mut machine = PositionStateMachine::new(symbol, self.config.risk.clone());
        let mut journal = TradeJournal::new();
        let mut stats = BacktestStats::new(self.config.initial_capital);
        let mut signals = Vec::new();

        info!(
            symbol,
            bars = bars.len(),
            capital = %self.config.initial_capital,
            "Starting backtest"
        );

        for (index, bar) in bars.iter().enumerate() {
            let at = bar.datetime();

            if let Some(order_id) = machine.pending_order_id().map(str::to_string) {
                let order = broker.execute_at_price(&order_id, to_decimal(bar.open), at)?;
                Self::settle(&order, &mut machine, &mut stats, &mut journal, at);
            }

            let close = to_decimal(bar.close);
            broker.update_price(symbol, close);

            let signal = strategy.on_bar(bar, machine.position_state());
            journal.signal(&signal);

            match machine.on_signal(&signal, close, at) {
                RiskDecision::Submit(intent) => {
                    signals.push(SignalRecord {
                        bar_index: index,
                        timestamp: bar.timestamp,
                        signal_type: match intent.side {
                            Side::Buy => SignalType::Buy,
                            Side::Sell => SignalType::Sell,
                        },
                        price: bar.close,
                        reason: intent.reason.clone(),
                        suppressed: false,
                    });

                    match broker.place_order(intent.to_request(self.config.risk.product)).await {
                        Ok(order) if order.status.is_failed() => {
                            journal.order_failed(&order);
                            machine.on_order_failed(order.status_message.as_deref().unwrap_or("rejected"));
                        }
                        Ok(order) => {
                            journal.order_submitted(&order);
                            machine.attach_order_id(order.id);
                        }
                        Err(e) => {
                            warn!(symbol, error = %e, "Order placement failed");
                            machine.on_order_failed(&e.to_string());
                        }
                    }
                }
                RiskDecision::Suppressed { reason } => {
                    stats.record_suppressed();
                    journal.suppressed_entry(symbol, &reason);
                    signals.push(SignalRecord {
                        bar_index: index,
                        timestamp: bar.timestamp,
                        signal_type: SignalType::Buy,
                        price: bar.close,
                        reason,
                        suppressed: true,
                    });
                }
                RiskDecision::Hold { reason } => {
                    debug!(symbol, index, reason = %reason, "Hold");
                }
            }

            stats.record_equity(bar.timestamp, broker.portfolio_snapshot().equity());
        }

        if let Some(order_id) = machine.pending_order_id().map(str::to_string) {
            broker.cancel_order(&order_id)?;
            if let Some(intent) = machine.cancel_pending() {
                info!(symbol, side = %intent.side, "Order still pending at end of data, canceled");
            }
        }

        let final_portfolio = broker.portfolio_snapshot();
        stats.finalize(final_portfolio.equity(), machine.position().cloned());

        info!(
            symbol,
            trades = stats.total_trades,
            final_equity = %stats.final_equity,
            return_pct = %stats.total_return_pct.round_dp(2),
            "Backtest complete"
        );

        Ok(BacktestReport {
            config: self.config.clone(),
            stats,
            signals,
            final_portfolio,
        })
    }

    fn settle(
        order: &Order,
        machine: &mut PositionStateMachine,
        stats: &mut BacktestStats,
        journal: &mut TradeJournal,
        at: DateTime<Utc>,
    ) {
        match order.status {
            OrderStatus::Filled => {
                if let Some(fill) = order.fills.last() {
                    journal.execution(&order.symbol, fill);
                }
                let price = order.filled_avg_price.unwrap_or(Decimal::ZERO);
                match machine.on_fill(price, order.commission(), at) {
                    FillOutcome::Closed(trade) => {
                        journal.trade_closed(&trade);
                        stats.add_trade(trade);
                    }
                    FillOutcome::Opened(_) | FillOutcome::Ignored => {}
                }
            }
            OrderStatus::Rejected | OrderStatus::Canceled => {
                journal.order_failed(order);
                machine.on_order_failed(order.status_message.as_deref().unwrap_or("rejected"));
            }
            OrderStatus::Pending | OrderStatus::PartiallyFilled => {}
        }
    }
}
