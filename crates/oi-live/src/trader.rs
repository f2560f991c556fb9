//! One polling cycle across instruments.
//!
//! Per instrument, in order:
//!
//! 1. reconcile the outstanding order, if any; a still-working order skips
//!    the instrument for this cycle
//! 2. fetch the lookback window and merge completed bars newer than the
//!    last seen; the candle still forming is left for a later cycle
//! 3. feed the new bars to the strategy and act on the newest one
//! 4. submit the resulting order
//!
//! A failure on one instrument is logged and the cycle moves on.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use oi_core::error::TradingError;
use oi_core::traits::{Broker, DataSource, Strategy};
use oi_core::types::{BarSeries, Instrument, Order, OrderStatus, SessionWindow, Timeframe};
use oi_monitor::TradeJournal;
use oi_risk::{FillOutcome, PositionStateMachine, RiskConfig, RiskDecision};
use oi_strategy::{OiDerivativeConfig, OiDerivativeStrategy};

/// Calendar days the first fetch reaches back, enough to span a weekend.
const WARMUP_DAYS: i64 = 4;

/// An instrument and the risk limits it trades under.
#[derive(Debug, Clone)]
pub struct LiveInstrument {
    pub instrument: Instrument,
    pub risk: RiskConfig,
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub strategy: OiDerivativeConfig,
    pub instruments: Vec<LiveInstrument>,
    pub timeframe: Timeframe,
    /// Bars retained per instrument and covered by each fetch
    pub lookback_bars: usize,
    pub session: SessionWindow,
    /// Cycle cadence, normally the venue's OI refresh interval
    pub poll_interval: Duration,
    /// Delay after each grid boundary before polling
    pub alignment_lag: Duration,
}

/// What one call to [`LiveTrader::run_cycle`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Instruments whose newest bar was evaluated
    pub evaluated: usize,
    pub orders_submitted: usize,
    /// Instruments skipped while an order is working
    pub awaiting_fill: usize,
    pub errors: usize,
}

enum Step {
    Evaluated { submitted: bool },
    AwaitingFill,
    NoNewBars,
}

struct InstrumentState {
    instrument: Instrument,
    strategy: OiDerivativeStrategy,
    machine: PositionStateMachine,
    series: BarSeries,
}

/// Live driver over a broker and a market-data source.
pub struct LiveTrader {
    pub(crate) config: LiveConfig,
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) data: Arc<dyn DataSource>,
    states: Vec<InstrumentState>,
    journal: TradeJournal,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl LiveTrader {
    pub fn new(
        config: LiveConfig,
        broker: Arc<dyn Broker>,
        data: Arc<dyn DataSource>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, TradingError> {
        if config.instruments.is_empty() {
            return Err(TradingError::Config("no instruments configured".to_string()));
        }
        if config.lookback_bars < 3 {
            return Err(TradingError::Config(format!(
                "history lookback must cover at least 3 bars, got {}",
                config.lookback_bars
            )));
        }
        if config.poll_interval <= Duration::zero() {
            return Err(TradingError::Config("poll interval must be positive".to_string()));
        }

        let states = config
            .instruments
            .iter()
            .map(|live| {
                live.risk.validate()?;
                let symbol = live.instrument.symbol.as_str();
                Ok(InstrumentState {
                    instrument: live.instrument.clone(),
                    strategy: OiDerivativeStrategy::new(symbol, config.strategy.clone())?,
                    machine: PositionStateMachine::new(symbol, live.risk.clone()),
                    series: BarSeries::with_capacity(symbol, config.timeframe, config.lookback_bars),
                })
            })
            .collect::<Result<Vec<_>, TradingError>>()?;

        Ok(Self {
            config,
            broker,
            data,
            states,
            journal: TradeJournal::new(),
            shutdown,
        })
    }

    pub fn journal(&self) -> &TradeJournal {
        &self.journal
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Machine for `symbol`, if configured.
    pub fn machine(&self, symbol: &str) -> Option<&PositionStateMachine> {
        self.states
            .iter()
            .find(|s| s.instrument.symbol == symbol)
            .map(|s| &s.machine)
    }

    /// Process every instrument once, sequentially.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        for index in 0..self.states.len() {
            if self.shutdown_requested() {
                info!("Shutdown requested, ending cycle early");
                break;
            }
            let symbol = self.states[index].instrument.symbol.clone();
            match self.process(index, now).await {
                Ok(Step::Evaluated { submitted }) => {
                    report.evaluated += 1;
                    if submitted {
                        report.orders_submitted += 1;
                    }
                }
                Ok(Step::AwaitingFill) => report.awaiting_fill += 1,
                Ok(Step::NoNewBars) => debug!(symbol = %symbol, "No new bar since last cycle"),
                Err(e) => {
                    report.errors += 1;
                    self.journal.instrument_error(&symbol, &e);
                }
            }
        }

        debug!(
            evaluated = report.evaluated,
            submitted = report.orders_submitted,
            awaiting = report.awaiting_fill,
            errors = report.errors,
            "Cycle complete"
        );
        report
    }

    async fn process(&mut self, index: usize, now: DateTime<Utc>) -> Result<Step, TradingError> {
        let Self {
            config,
            broker,
            data,
            states,
            journal,
            shutdown,
        } = self;
        let state = &mut states[index];
        let symbol = state.instrument.symbol.clone();

        if let Some(order_id) = state.machine.pending_order_id().map(str::to_string) {
            let order = broker.get_order(&order_id).await?;
            if !settle(&order, &mut state.machine, journal, now) {
                debug!(symbol = %symbol, order_id = %order_id, status = ?order.status, "Order still working");
                return Ok(Step::AwaitingFill);
            }
        }

        let lookback = if state.series.is_empty() {
            Duration::days(WARMUP_DAYS)
        } else {
            Duration::seconds(config.timeframe.as_secs() as i64 * config.lookback_bars as i64)
        };
        let fetched = data
            .get_historical_bars(&state.instrument, config.timeframe, now - lookback, now)
            .await?;
        // A candle is final once its interval has elapsed.
        let bar_length = Duration::seconds(config.timeframe.as_secs() as i64);
        let completed = fetched
            .into_iter()
            .filter(|bar| bar.datetime() + bar_length <= now);
        let appended = state.series.merge_newer(completed);
        let Some((newest, catch_up)) = appended.split_last() else {
            return Ok(Step::NoNewBars);
        };

        // Older bars only advance the derivative state.
        for bar in catch_up {
            state.strategy.on_bar(bar, state.machine.position_state());
        }
        if !catch_up.is_empty() {
            debug!(symbol = %symbol, bars = catch_up.len(), "Caught up on missed bars");
        }

        journal.tick(&symbol, newest.close, newest.open_interest);
        let signal = state.strategy.on_bar(newest, state.machine.position_state());
        journal.signal(&signal);

        let price = Decimal::try_from(newest.close).unwrap_or(Decimal::ZERO);
        broker.observe_price(&symbol, price);

        // Re-read: the flag may have flipped while this instrument was fetching.
        let shutting_down = *shutdown.borrow();
        let submitted = match state.machine.on_signal(&signal, price, now) {
            RiskDecision::Submit(intent) if shutting_down => {
                state.machine.cancel_pending();
                info!(symbol = %symbol, side = %intent.side, "Shutdown requested, order not placed");
                false
            }
            RiskDecision::Submit(intent) => {
                let request = intent.to_request(state.machine.config().product);
                match broker.place_order(request).await {
                    Ok(order) if order.status.is_failed() => {
                        settle(&order, &mut state.machine, journal, now);
                        false
                    }
                    Ok(order) => {
                        journal.order_submitted(&order);
                        state.machine.attach_order_id(order.id.clone());
                        settle(&order, &mut state.machine, journal, now);
                        true
                    }
                    Err(e) => {
                        state.machine.on_order_failed(&e.to_string());
                        return Err(e.into());
                    }
                }
            }
            RiskDecision::Suppressed { reason } => {
                journal.suppressed_entry(&symbol, &reason);
                false
            }
            RiskDecision::Hold { reason } => {
                debug!(symbol = %symbol, reason = %reason, "Hold");
                false
            }
        };

        Ok(Step::Evaluated { submitted })
    }

    /// Log outstanding orders and open positions before exit.
    pub async fn shutdown_summary(&self) {
        for state in &self.states {
            let symbol = state.instrument.symbol.as_str();
            if let Some(order_id) = state.machine.pending_order_id() {
                warn!(symbol, order_id, "Order still outstanding at shutdown");
            }
            if let Some(position) = state.machine.position() {
                warn!(
                    symbol,
                    quantity = %position.quantity,
                    entry = %position.avg_entry_price,
                    "Position still open at shutdown"
                );
            }
        }

        match self.broker.get_positions().await {
            Ok(positions) => {
                for position in positions {
                    info!(
                        symbol = %position.symbol,
                        quantity = %position.quantity,
                        "Broker position"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Could not fetch broker positions"),
        }

        info!(
            trades = self.journal.closed_trades(),
            net_pnl = %self.journal.net_pnl(),
            suppressed = self.journal.suppressed(),
            "Session summary"
        );
    }
}

/// Apply a terminal order to the machine. Returns false while it is
/// still working.
fn settle(
    order: &Order,
    machine: &mut PositionStateMachine,
    journal: &mut TradeJournal,
    now: DateTime<Utc>,
) -> bool {
    match order.status {
        OrderStatus::Filled => {
            if let Some(fill) = order.fills.last() {
                journal.execution(&order.symbol, fill);
            }
            let price = order.filled_avg_price.unwrap_or(Decimal::ZERO);
            let at = order.filled_at.unwrap_or(now);
            if let FillOutcome::Closed(trade) = machine.on_fill(price, order.commission(), at) {
                journal.trade_closed(&trade);
            }
            true
        }
        OrderStatus::Rejected | OrderStatus::Canceled => {
            journal.order_failed(order);
            machine.on_order_failed(order.status_message.as_deref().unwrap_or("rejected"));
            true
        }
        OrderStatus::Pending | OrderStatus::PartiallyFilled => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oi_broker::{FillMode, PaperBroker};
    use oi_core::error::DataError;
    use oi_core::types::{Bar, PositionState};
    use oi_data::synthetic::ShortCoveringScenario;
    use oi_indicators::DerivativeConfig;
    use oi_strategy::SignalParams;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Serves a prefix of a fixed bar history; symbols in `failing` error.
    struct ScriptedSource {
        bars: Vec<Bar>,
        visible: Mutex<usize>,
        failing: Vec<String>,
        /// Flipped to true on the next fetch, as a Ctrl-C mid-cycle would
        interrupt_on_fetch: Mutex<Option<watch::Sender<bool>>>,
    }

    impl ScriptedSource {
        fn new(bars: Vec<Bar>) -> Self {
            Self {
                bars,
                visible: Mutex::new(0),
                failing: Vec::new(),
                interrupt_on_fetch: Mutex::new(None),
            }
        }

        fn reveal(&self, count: usize) {
            *self.visible.lock().unwrap() = count;
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn get_historical_bars(
            &self,
            instrument: &Instrument,
            _timeframe: Timeframe,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Bar>, DataError> {
            if self.failing.contains(&instrument.symbol) {
                return Err(DataError::ConnectionError("timed out".to_string()));
            }
            if let Some(tx) = self.interrupt_on_fetch.lock().unwrap().take() {
                tx.send(true).unwrap();
            }
            let visible = *self.visible.lock().unwrap();
            Ok(self.bars[..visible]
                .iter()
                .filter(|b| b.datetime() >= start && b.datetime() <= end)
                .copied()
                .collect())
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    fn config(symbols: &[&str]) -> LiveConfig {
        LiveConfig {
            strategy: OiDerivativeConfig {
                derivative: DerivativeConfig::new(3.0, 50),
                params: SignalParams::moving_average_pct(0.005, 0.001, 0.005),
            },
            instruments: symbols
                .iter()
                .enumerate()
                .map(|(i, s)| LiveInstrument {
                    instrument: Instrument::new(*s, 1000 + i as u64, 25),
                    risk: RiskConfig::default(),
                })
                .collect(),
            timeframe: Timeframe::Minute3,
            lookback_bars: 120,
            session: SessionWindow::default(),
            poll_interval: Duration::seconds(180),
            alignment_lag: Duration::seconds(13),
        }
    }

    /// Reveal bars up to and including `index`, then run one cycle just
    /// after bar `index` closes.
    async fn step(trader: &mut LiveTrader, source: &ScriptedSource, bars: &[Bar], index: usize) -> CycleReport {
        source.reveal(index + 1);
        trader.run_cycle(bars[index].datetime() + Duration::seconds(180 + 13)).await
    }

    #[tokio::test]
    async fn test_dry_run_round_trip() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let onset = scenario.onset_index();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)).with_fill_mode(FillMode::Immediate));
        let (_tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker.clone(), source.clone(), rx).unwrap();

        let warmup = step(&mut trader, &source, &bars, onset - 1).await;
        assert_eq!(warmup.evaluated, 1);
        assert_eq!(warmup.orders_submitted, 0);

        let entry = step(&mut trader, &source, &bars, onset).await;
        assert_eq!(entry.orders_submitted, 1);
        assert_eq!(trader.machine("NIFTY").unwrap().position_state(), PositionState::Long);

        for index in onset + 1..=onset + 2 {
            let held = step(&mut trader, &source, &bars, index).await;
            assert_eq!(held.orders_submitted, 0);
        }

        let exit = step(&mut trader, &source, &bars, onset + 3).await;
        assert_eq!(exit.orders_submitted, 1);
        let machine = trader.machine("NIFTY").unwrap();
        assert_eq!(machine.position_state(), PositionState::Flat);
        assert_eq!(machine.counters().trades_today, 1);
        assert_eq!(trader.journal().closed_trades(), 1);
        assert!(trader.journal().net_pnl() > Decimal::ZERO);
        assert!(broker.get_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_order_is_reconciled_before_evaluation() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let onset = scenario.onset_index();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (_tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker.clone(), source.clone(), rx).unwrap();

        step(&mut trader, &source, &bars, onset - 1).await;
        let entry = step(&mut trader, &source, &bars, onset).await;
        assert_eq!(entry.orders_submitted, 1);
        let order_id = trader.machine("NIFTY").unwrap().pending_order_id().unwrap().to_string();

        let waiting = step(&mut trader, &source, &bars, onset + 1).await;
        assert_eq!(waiting.awaiting_fill, 1);
        assert_eq!(waiting.evaluated, 0);

        broker
            .execute_at_price(&order_id, dec!(108), bars[onset + 1].datetime())
            .unwrap();
        let filled = step(&mut trader, &source, &bars, onset + 2).await;
        assert_eq!(filled.evaluated, 1);
        let machine = trader.machine("NIFTY").unwrap();
        assert_eq!(machine.position_state(), PositionState::Long);
        assert_eq!(machine.position().unwrap().avg_entry_price, dec!(108));
    }

    #[tokio::test]
    async fn test_rejected_entry_reverts_to_flat() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let onset = scenario.onset_index();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        broker.reject_next("margin exceeded");
        let (_tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker, source.clone(), rx).unwrap();

        step(&mut trader, &source, &bars, onset - 1).await;
        let entry = step(&mut trader, &source, &bars, onset).await;
        assert_eq!(entry.orders_submitted, 0);
        let machine = trader.machine("NIFTY").unwrap();
        assert_eq!(machine.position_state(), PositionState::Flat);
        assert!(!machine.has_pending_order());
        assert_eq!(machine.counters().trades_today, 0);
    }

    #[tokio::test]
    async fn test_instrument_failure_is_isolated() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let mut source = ScriptedSource::new(bars.clone());
        source.failing.push("BANKNIFTY".to_string());
        let source = Arc::new(source);
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (_tx, rx) = watch::channel(false);
        let mut trader =
            LiveTrader::new(config(&["BANKNIFTY", "NIFTY"]), broker, source.clone(), rx).unwrap();

        let report = step(&mut trader, &source, &bars, 10).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.evaluated, 1);
    }

    #[tokio::test]
    async fn test_no_new_bar_is_not_evaluated_twice() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (_tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker, source.clone(), rx).unwrap();

        assert_eq!(step(&mut trader, &source, &bars, 20).await.evaluated, 1);
        assert_eq!(step(&mut trader, &source, &bars, 20).await.evaluated, 0);
    }

    #[tokio::test]
    async fn test_forming_candle_waits_for_close() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (_tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker, source.clone(), rx).unwrap();

        // Bar 20 has only just opened: bar 19 is the newest complete one.
        source.reveal(21);
        let early = trader.run_cycle(bars[20].datetime() + Duration::seconds(13)).await;
        assert_eq!(early.evaluated, 1);

        // Once it closes, bar 20 is merged with its final values.
        let closed = trader.run_cycle(bars[20].datetime() + Duration::seconds(193)).await;
        assert_eq!(closed.evaluated, 1);
        assert_eq!(step(&mut trader, &source, &bars, 20).await.evaluated, 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_cycle_places_no_order() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let onset = scenario.onset_index();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker.clone(), source.clone(), rx).unwrap();

        step(&mut trader, &source, &bars, onset - 1).await;
        *source.interrupt_on_fetch.lock().unwrap() = Some(tx);
        let report = step(&mut trader, &source, &bars, onset).await;

        // The onset bar was evaluated but its BUY was dropped.
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.orders_submitted, 0);
        assert!(trader.shutdown_requested());
        assert!(broker.get_orders().await.unwrap().is_empty());
        let machine = trader.machine("NIFTY").unwrap();
        assert_eq!(machine.position_state(), PositionState::Flat);
        assert!(!machine.has_pending_order());
    }

    #[tokio::test]
    async fn test_shutdown_before_cycle_skips_instruments() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let source = Arc::new(ScriptedSource::new(bars.clone()));
        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let (tx, rx) = watch::channel(false);
        let mut trader = LiveTrader::new(config(&["NIFTY"]), broker, source.clone(), rx).unwrap();

        tx.send(true).unwrap();
        let report = step(&mut trader, &source, &bars, 20).await;
        assert_eq!(report, CycleReport::default());
    }
}
