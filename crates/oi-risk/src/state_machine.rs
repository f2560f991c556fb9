//! Per-instrument position and order lifecycle.
//!
//! ```text
//! FLAT --BUY--> PENDING_ENTRY --fill--> LONG --SELL/SL/TP--> PENDING_EXIT --fill--> FLAT
//!                    |                                          |
//!                    +--rejected/canceled--> FLAT               +--rejected/canceled--> LONG
//! ```
//!
//! At most one order is outstanding per instrument; signals arriving while
//! one is pending are ignored.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use oi_core::error::TradingError;
use oi_core::types::{
    ExitReason, OrderRequest, PositionState, Position, Product, Side, Signal, SignalType,
};

use crate::limits::RiskCounters;
use crate::stop_loss::ExitBands;

/// Risk parameters for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub bands: ExitBands,
    pub max_daily_trades: u32,
    /// Contracts per entry (lots times lot size)
    pub quantity: Decimal,
    pub product: Product,
    /// Offset of the exchange's local time from UTC, for session dates
    pub utc_offset_minutes: i32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            bands: ExitBands::default(),
            max_daily_trades: 30,
            quantity: dec!(25),
            product: Product::Intraday,
            utc_offset_minutes: 330,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.bands.stop_loss_pct < Decimal::ZERO || self.bands.stop_loss_pct >= Decimal::ONE {
            return Err(TradingError::Config(format!(
                "stop_loss_pct must be in [0, 1), got {}",
                self.bands.stop_loss_pct
            )));
        }
        if self.bands.take_profit_pct < Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "take_profit_pct must be non-negative, got {}",
                self.bands.take_profit_pct
            )));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "order quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    /// Exchange-local calendar date of `at`.
    pub fn session_date(&self, at: DateTime<Utc>) -> NaiveDate {
        (at + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }
}

/// An order the driver should place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub reason: String,
    pub exit_reason: Option<ExitReason>,
    /// Price observed when the intent was created
    pub signal_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    pub fn to_request(&self, product: Product) -> OrderRequest {
        OrderRequest::market(&self.symbol, self.side, self.quantity).with_product(product)
    }
}

/// Outcome of feeding a signal to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    /// Place this order; the machine is now pending
    Submit(OrderIntent),
    /// Nothing to do
    Hold { reason: String },
    /// A BUY was turned away by a risk limit
    Suppressed { reason: String },
}

impl RiskDecision {
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            RiskDecision::Submit(intent) => Some(intent),
            _ => None,
        }
    }

    /// The signal type this decision amounts to.
    pub fn signal_type(&self) -> SignalType {
        match self {
            RiskDecision::Submit(intent) => match intent.side {
                Side::Buy => SignalType::Buy,
                Side::Sell => SignalType::Sell,
            },
            _ => SignalType::Hold,
        }
    }
}

/// A completed round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// `(exit_price - entry_price) * quantity`
    pub pnl: Decimal,
    /// Entry plus exit commission
    pub commission: Decimal,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    pub fn net_pnl(&self) -> Decimal {
        self.pnl - self.commission
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl() > Decimal::ZERO
    }

    pub fn holding_period(&self) -> Duration {
        self.exit_time - self.entry_time
    }
}

/// Result of applying a fill.
#[derive(Debug, Clone)]
pub enum FillOutcome {
    Opened(Position),
    Closed(ClosedTrade),
    /// No order was pending
    Ignored,
}

#[derive(Debug, Clone)]
pub enum MachineState {
    Flat,
    PendingEntry {
        intent: OrderIntent,
        order_id: Option<String>,
    },
    Long {
        position: Position,
        entry_commission: Decimal,
    },
    PendingExit {
        position: Position,
        entry_commission: Decimal,
        intent: OrderIntent,
        order_id: Option<String>,
    },
}

/// Position and risk state for one instrument.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    symbol: String,
    config: RiskConfig,
    state: MachineState,
    counters: RiskCounters,
}

impl PositionStateMachine {
    pub fn new(symbol: impl Into<String>, config: RiskConfig) -> Self {
        let counters = RiskCounters::new(config.max_daily_trades);
        Self {
            symbol: symbol.into(),
            config,
            state: MachineState::Flat,
            counters,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn counters(&self) -> &RiskCounters {
        &self.counters
    }

    /// Position state as the signal evaluator sees it; a pending entry
    /// counts as LONG and a pending exit as FLAT.
    pub fn position_state(&self) -> PositionState {
        match self.state {
            MachineState::Flat | MachineState::PendingExit { .. } => PositionState::Flat,
            MachineState::PendingEntry { .. } | MachineState::Long { .. } => PositionState::Long,
        }
    }

    /// The open position, including one with an exit pending.
    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            MachineState::Long { position, .. } | MachineState::PendingExit { position, .. } => {
                Some(position)
            }
            _ => None,
        }
    }

    pub fn has_pending_order(&self) -> bool {
        self.pending_intent().is_some()
    }

    pub fn pending_intent(&self) -> Option<&OrderIntent> {
        match &self.state {
            MachineState::PendingEntry { intent, .. } | MachineState::PendingExit { intent, .. } => {
                Some(intent)
            }
            _ => None,
        }
    }

    pub fn pending_order_id(&self) -> Option<&str> {
        match &self.state {
            MachineState::PendingEntry { order_id, .. }
            | MachineState::PendingExit { order_id, .. } => order_id.as_deref(),
            _ => None,
        }
    }

    /// Record the broker id of the order placed for the pending intent.
    pub fn attach_order_id(&mut self, id: impl Into<String>) {
        match &mut self.state {
            MachineState::PendingEntry { order_id, .. }
            | MachineState::PendingExit { order_id, .. } => *order_id = Some(id.into()),
            _ => warn!(symbol = %self.symbol, "Order id attached with no pending order"),
        }
    }

    /// Turn a signal into an order intent, or decline.
    ///
    /// While LONG, stop-loss and take-profit are checked against
    /// `current_price` before the signal is looked at.
    pub fn on_signal(
        &mut self,
        signal: &Signal,
        current_price: Decimal,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        if self.counters.roll_session(self.config.session_date(now)) {
            info!(symbol = %self.symbol, session = ?self.counters.session(), "New session, trade counter reset");
        }

        if self.has_pending_order() {
            return RiskDecision::Hold {
                reason: "order pending".to_string(),
            };
        }

        let band_exit = match &self.state {
            MachineState::Long { position, .. } => {
                self.config.bands.check(position.avg_entry_price, current_price)
            }
            _ => None,
        };
        if let Some(exit) = band_exit {
            return self.begin_exit(exit, current_price, now);
        }

        let is_long = matches!(self.state, MachineState::Long { .. });
        match (signal.signal_type, is_long) {
            (SignalType::Buy, false) => {
                if !self.counters.can_enter() {
                    self.counters.record_suppressed();
                    warn!(
                        symbol = %self.symbol,
                        trades_today = self.counters.trades_today,
                        "BUY suppressed: daily trade limit reached"
                    );
                    return RiskDecision::Suppressed {
                        reason: "daily trade limit reached".to_string(),
                    };
                }
                let intent = OrderIntent {
                    symbol: self.symbol.clone(),
                    side: Side::Buy,
                    quantity: self.config.quantity,
                    reason: signal.reason.clone(),
                    exit_reason: None,
                    signal_price: current_price,
                    created_at: now,
                };
                info!(symbol = %self.symbol, price = %current_price, quantity = %intent.quantity, "Entry intent");
                self.state = MachineState::PendingEntry {
                    intent: intent.clone(),
                    order_id: None,
                };
                RiskDecision::Submit(intent)
            }
            (SignalType::Buy, true) => RiskDecision::Hold {
                reason: "already in position".to_string(),
            },
            (SignalType::Sell, true) => {
                let exit = signal.exit_reason.unwrap_or(ExitReason::FirstDerivative);
                self.begin_exit(exit, current_price, now)
            }
            (SignalType::Sell, false) => RiskDecision::Hold {
                reason: "no position to close".to_string(),
            },
            (SignalType::Hold, _) => RiskDecision::Hold {
                reason: signal.reason.clone(),
            },
        }
    }

    fn begin_exit(&mut self, exit: ExitReason, price: Decimal, now: DateTime<Utc>) -> RiskDecision {
        let MachineState::Long {
            position,
            entry_commission,
        } = std::mem::replace(&mut self.state, MachineState::Flat)
        else {
            return RiskDecision::Hold {
                reason: "no position to close".to_string(),
            };
        };

        let intent = OrderIntent {
            symbol: self.symbol.clone(),
            side: Side::Sell,
            quantity: position.quantity,
            reason: exit.as_str().to_string(),
            exit_reason: Some(exit),
            signal_price: price,
            created_at: now,
        };
        info!(symbol = %self.symbol, price = %price, reason = %exit, "Exit intent");
        self.state = MachineState::PendingExit {
            position,
            entry_commission,
            intent: intent.clone(),
            order_id: None,
        };
        RiskDecision::Submit(intent)
    }

    /// Confirm execution of the pending order.
    pub fn on_fill(&mut self, price: Decimal, commission: Decimal, at: DateTime<Utc>) -> FillOutcome {
        match std::mem::replace(&mut self.state, MachineState::Flat) {
            MachineState::PendingEntry { intent, .. } => {
                let position = Position::new(&self.symbol, intent.quantity, price, at);
                self.counters.record_entry();
                info!(
                    symbol = %self.symbol,
                    price = %price,
                    quantity = %intent.quantity,
                    trades_today = self.counters.trades_today,
                    "Position opened"
                );
                self.state = MachineState::Long {
                    position: position.clone(),
                    entry_commission: commission,
                };
                FillOutcome::Opened(position)
            }
            MachineState::PendingExit {
                position,
                entry_commission,
                intent,
                ..
            } => {
                let pnl = (price - position.avg_entry_price) * position.quantity;
                let trade = ClosedTrade {
                    symbol: self.symbol.clone(),
                    quantity: position.quantity,
                    entry_price: position.avg_entry_price,
                    exit_price: price,
                    entry_time: position.entry_time,
                    exit_time: at,
                    pnl,
                    commission: entry_commission + commission,
                    exit_reason: intent.exit_reason.unwrap_or(ExitReason::FirstDerivative),
                };
                info!(symbol = %self.symbol, price = %price, pnl = %pnl, "Position closed");
                FillOutcome::Closed(trade)
            }
            other => {
                warn!(symbol = %self.symbol, "Fill received with no pending order");
                self.state = other;
                FillOutcome::Ignored
            }
        }
    }

    /// The pending order was rejected or canceled: restore the prior state.
    pub fn on_order_failed(&mut self, reason: &str) {
        match std::mem::replace(&mut self.state, MachineState::Flat) {
            MachineState::PendingEntry { .. } => {
                warn!(symbol = %self.symbol, reason, "Entry order failed, staying flat");
            }
            MachineState::PendingExit {
                position,
                entry_commission,
                ..
            } => {
                warn!(symbol = %self.symbol, reason, "Exit order failed, position still open");
                self.state = MachineState::Long {
                    position,
                    entry_commission,
                };
            }
            other => self.state = other,
        }
    }

    /// Drop a pending order without a broker round trip, e.g. when the
    /// data stream ends before it could fill.
    pub fn cancel_pending(&mut self) -> Option<OrderIntent> {
        let intent = self.pending_intent().cloned();
        if intent.is_some() {
            self.on_order_failed("canceled");
        }
        intent
    }
}
