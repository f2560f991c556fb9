//! Session-aware polling loop and shutdown handling.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use oi_core::error::TradingError;
use oi_core::types::SessionWindow;

use crate::trader::LiveTrader;

/// Shutdown flag shared between the signal handler and the loop.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Flip the shutdown flag on Ctrl-C.
pub fn spawn_ctrl_c(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after the current instrument");
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}

fn instant_at(at: DateTime<Utc>) -> Instant {
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    Instant::now() + wait
}

impl LiveTrader {
    /// Wait for the next shutdown request. Pends forever once the sender
    /// is gone.
    async fn shutdown_signal(&mut self) {
        loop {
            if self.shutdown_requested() {
                return;
            }
            if self.shutdown.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep until `until`. Returns true if shutdown was requested first.
    async fn sleep_until(&mut self, until: DateTime<Utc>) -> bool {
        let interrupted = tokio::select! {
            _ = time::sleep_until(instant_at(until)) => false,
            _ = self.shutdown_signal() => true,
        };
        interrupted || self.shutdown_requested()
    }

    /// Poll on the aligned grid until the session closes or shutdown is
    /// requested.
    ///
    /// Waits for the next open when started outside trading hours, and
    /// returns at once when started after the close of a trading day. A
    /// cycle that overruns the cadence delays the next one.
    pub async fn run(&mut self) -> Result<(), TradingError> {
        let session = self.config.session;
        let interval = self.config.poll_interval;
        let lag = self.config.alignment_lag;

        let now = Utc::now();
        if SessionWindow::is_trading_day(session.session_date(now)) && session.is_past_close(now) {
            info!("Session already closed for today");
            self.shutdown_summary().await;
            return Ok(());
        }
        if !session.is_open(now) {
            let open = session.next_open(now);
            info!(opens_at = %open, "Waiting for session open");
            if self.sleep_until(open).await {
                self.shutdown_summary().await;
                return Ok(());
            }
        }

        let start = Utc::now();
        let close = session.close_of(start);
        let period = interval
            .to_std()
            .map_err(|e| TradingError::Config(format!("invalid poll interval: {e}")))?;
        let first = session.next_aligned(start, interval, lag);
        let mut ticker = time::interval_at(instant_at(first), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            broker = self.broker.name(),
            data = self.data.name(),
            instruments = self.config.instruments.len(),
            interval_secs = interval.num_seconds(),
            first_cycle = %first,
            closes_at = %close,
            "Live session started"
        );

        // Catch up at once rather than idling until the first boundary.
        self.run_cycle(start).await;

        loop {
            let interrupted = tokio::select! {
                _ = ticker.tick() => false,
                _ = self.shutdown_signal() => true,
            };
            if interrupted || self.shutdown_requested() {
                break;
            }
            let now = Utc::now();
            if now >= close {
                info!("Session closed");
                break;
            }
            self.run_cycle(now).await;
        }

        self.shutdown_summary().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trader::{LiveConfig, LiveInstrument};
    use async_trait::async_trait;
    use chrono::Duration;
    use oi_broker::PaperBroker;
    use oi_core::error::DataError;
    use oi_core::traits::DataSource;
    use oi_core::types::{Bar, Instrument, Timeframe};
    use oi_risk::RiskConfig;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct EmptySource;

    #[async_trait]
    impl DataSource for EmptySource {
        async fn get_historical_bars(
            &self,
            _instrument: &Instrument,
            _timeframe: Timeframe,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Bar>, DataError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "Empty"
        }
    }

    fn trader(rx: watch::Receiver<bool>) -> LiveTrader {
        let config = LiveConfig {
            strategy: Default::default(),
            instruments: vec![LiveInstrument {
                instrument: Instrument::new("NIFTY", 256265, 25),
                risk: RiskConfig::default(),
            }],
            timeframe: Timeframe::Minute3,
            lookback_bars: 60,
            session: SessionWindow::default(),
            poll_interval: Duration::seconds(180),
            alignment_lag: Duration::seconds(13),
        };
        LiveTrader::new(
            config,
            Arc::new(PaperBroker::new(dec!(100000))),
            Arc::new(EmptySource),
            rx,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_promptly_after_shutdown() {
        let (tx, rx) = shutdown_channel();
        tx.send(true).unwrap();
        let mut trader = trader(rx);

        let result = time::timeout(std::time::Duration::from_secs(5), trader.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_sleep_is_interrupted_by_shutdown() {
        let (tx, rx) = shutdown_channel();
        let mut trader = trader(rx);

        let sender = tokio::spawn(async move {
            time::sleep(std::time::Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });
        let interrupted = trader.sleep_until(Utc::now() + Duration::hours(1)).await;
        assert!(interrupted);
        drop(sender.await.unwrap());
    }
}
