//! Configuration structures.

use chrono::{NaiveDate, NaiveTime};
use oi_core::error::TradingError;
use oi_core::types::{Instrument, InstrumentMaster, Product, SessionWindow, Timeframe};
use oi_indicators::DerivativeConfig;
use oi_risk::{ExitBands, RiskConfig};
use oi_strategy::{
    days_to_expiry, DteWindow, MovementType, OiDerivativeConfig, SignalParams, StrikeSelector,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub instruments: Vec<InstrumentSettings>,
    #[serde(default)]
    pub selection: SelectionSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdModeName {
    Absolute,
    #[default]
    MovingAveragePct,
}

/// Signal thresholds and derivative engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub mode: ThresholdModeName,
    pub sensitivity: f64,
    pub feeling: f64,
    pub entry_threshold_pct: f64,
    pub exit_doi_threshold_pct: f64,
    pub exit_d2oi_threshold_pct: f64,
    pub oi_ma_period: usize,
    pub sampling_interval: f64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            mode: ThresholdModeName::MovingAveragePct,
            sensitivity: 0.01,
            feeling: 3_000_000.0,
            entry_threshold_pct: 0.005,
            exit_doi_threshold_pct: 0.001,
            exit_d2oi_threshold_pct: 0.005,
            oi_ma_period: 50,
            sampling_interval: 3.0,
        }
    }
}

/// Risk management settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub max_daily_trades: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(0.15),
            take_profit_pct: dec!(0.30),
            max_daily_trades: 30,
        }
    }
}

/// Live polling cadence and trading hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub data_refresh_interval_seconds: u64,
    /// Delay after each refresh boundary before polling, so the venue has
    /// published the new open interest.
    pub alignment_lag_seconds: u64,
    pub trading_start_time: String,
    pub trading_end_time: String,
    pub utc_offset_minutes: i32,
    pub history_lookback_bars: usize,
    pub bar_interval: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            data_refresh_interval_seconds: 180,
            alignment_lag_seconds: 13,
            trading_start_time: "09:15:00".to_string(),
            trading_end_time: "15:30:00".to_string(),
            utc_offset_minutes: 330,
            history_lookback_bars: 60,
            bar_interval: "3minute".to_string(),
        }
    }
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, TradingError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| TradingError::Config(format!("{field} '{value}': {e}")))
}

impl SessionSettings {
    pub fn window(&self) -> Result<SessionWindow, TradingError> {
        let start = parse_time("trading_start_time", &self.trading_start_time)?;
        let end = parse_time("trading_end_time", &self.trading_end_time)?;
        if start >= end {
            return Err(TradingError::Config(format!(
                "trading_start_time {start} must be before trading_end_time {end}"
            )));
        }
        Ok(SessionWindow::new(start, end, self.utc_offset_minutes))
    }

    pub fn timeframe(&self) -> Result<Timeframe, TradingError> {
        self.bar_interval.parse().map_err(TradingError::Config)
    }
}

/// One traded contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSettings {
    pub symbol: String,
    pub instrument_token: u64,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_lot_size")]
    pub lot_size: u32,
}

fn default_exchange() -> String {
    "NFO".to_string()
}

fn default_lot_size() -> u32 {
    25
}

impl InstrumentSettings {
    pub fn to_instrument(&self) -> Instrument {
        Instrument::new(&self.symbol, self.instrument_token, self.lot_size)
            .with_exchange(&self.exchange)
    }

    /// Fill in the token from the instrument master when it is zero, and
    /// check that a configured token still names this symbol.
    ///
    /// Returns the days to expiry when the contract has one.
    pub fn resolve(
        &mut self,
        master: &InstrumentMaster,
        today: NaiveDate,
    ) -> Result<Option<i64>, TradingError> {
        let entry = if self.instrument_token == 0 {
            let entry = master.by_symbol(&self.symbol).ok_or_else(|| {
                TradingError::Config(format!("{}: not in the instrument master", self.symbol))
            })?;
            self.instrument_token = entry.instrument_token;
            entry
        } else {
            let entry = master.by_token(self.instrument_token).ok_or_else(|| {
                TradingError::Config(format!(
                    "{}: instrument token {} not in the instrument master",
                    self.symbol, self.instrument_token
                ))
            })?;
            if entry.symbol != self.symbol {
                return Err(TradingError::Config(format!(
                    "{}: instrument token {} belongs to {}",
                    self.symbol, self.instrument_token, entry.symbol
                )));
            }
            entry
        };
        Ok(entry.expiry.map(|expiry| days_to_expiry(expiry, today)))
    }
}

/// Contract selection for the `strikes` command and the live expiry check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub underlying: String,
    pub movement: MovementType,
    pub max_strikes: usize,
    pub min_dte: i64,
    pub max_dte: i64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            underlying: "NIFTY".to_string(),
            movement: MovementType::ShortCovering,
            max_strikes: 3,
            min_dte: 1,
            max_dte: 4,
        }
    }
}

impl SelectionSettings {
    pub fn dte_window(&self) -> DteWindow {
        DteWindow {
            min: self.min_dte,
            max: self.max_dte,
        }
    }

    pub fn selector(&self) -> StrikeSelector {
        StrikeSelector::new(&self.underlying, self.movement)
            .with_max_strikes(self.max_strikes)
            .with_dte(self.dte_window())
    }
}

/// Kite Connect settings. Credentials usually come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub api_key: String,
    pub access_token: String,
    pub base_url: String,
    pub exchange: String,
    pub product: Product,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            access_token: String::new(),
            base_url: "https://api.kite.trade".to_string(),
            exchange: "NFO".to_string(),
            product: Product::Intraday,
        }
    }
}

impl BrokerSettings {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.access_token.is_empty()
    }
}

/// Backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_cash: Decimal,
    pub commission_pct: Decimal,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100000),
            commission_pct: dec!(0.001),
        }
    }
}

/// Bar file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub timestamp_format: String,
    pub has_headers: bool,
    /// Aggregate loaded bars to this many minutes before evaluation
    pub resample_minutes: Option<u32>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y-%m-%d %H:%M:%S%:z".to_string(),
            has_headers: true,
            resample_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl AppConfig {
    pub fn signal_params(&self) -> SignalParams {
        let s = &self.strategy;
        match s.mode {
            ThresholdModeName::Absolute => SignalParams::absolute(s.sensitivity, s.feeling),
            ThresholdModeName::MovingAveragePct => SignalParams::moving_average_pct(
                s.entry_threshold_pct,
                s.exit_doi_threshold_pct,
                s.exit_d2oi_threshold_pct,
            ),
        }
    }

    pub fn derivative_config(&self) -> DerivativeConfig {
        DerivativeConfig::new(self.strategy.sampling_interval, self.strategy.oi_ma_period)
    }

    pub fn strategy_config(&self) -> OiDerivativeConfig {
        OiDerivativeConfig {
            derivative: self.derivative_config(),
            params: self.signal_params(),
        }
    }

    /// Risk settings for an instrument trading `lot_size` contracts per entry.
    pub fn risk_config(&self, lot_size: u32) -> RiskConfig {
        RiskConfig {
            bands: ExitBands::new(self.risk.stop_loss_pct, self.risk.take_profit_pct),
            max_daily_trades: self.risk.max_daily_trades,
            quantity: Decimal::from(lot_size),
            product: self.broker.product,
            utc_offset_minutes: self.session.utc_offset_minutes,
        }
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments.iter().map(InstrumentSettings::to_instrument).collect()
    }

    /// Check everything that can be checked without the network.
    pub fn validate(&self) -> Result<(), TradingError> {
        self.derivative_config().validate()?;
        self.signal_params().validate()?;
        self.risk_config(default_lot_size()).validate()?;
        self.session.window()?;
        self.session.timeframe()?;

        if self.session.data_refresh_interval_seconds == 0 {
            return Err(TradingError::Config(
                "data_refresh_interval_seconds must be positive".to_string(),
            ));
        }
        if self.backtest.initial_cash <= Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "initial_cash must be positive, got {}",
                self.backtest.initial_cash
            )));
        }
        if self.backtest.commission_pct < Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "commission_pct must be non-negative, got {}",
                self.backtest.commission_pct
            )));
        }

        if self.selection.max_strikes == 0 {
            return Err(TradingError::Config("selection.max_strikes must be positive".to_string()));
        }
        if self.selection.min_dte > self.selection.max_dte {
            return Err(TradingError::Config(format!(
                "selection.min_dte {} exceeds max_dte {}",
                self.selection.min_dte, self.selection.max_dte
            )));
        }

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if instrument.lot_size == 0 {
                return Err(TradingError::Config(format!(
                    "{}: lot_size must be positive",
                    instrument.symbol
                )));
            }
            if !seen.insert(instrument.symbol.as_str()) {
                return Err(TradingError::Config(format!(
                    "{}: listed more than once",
                    instrument.symbol
                )));
            }
        }
        Ok(())
    }

    /// Validation for the live command: also needs instruments and credentials.
    pub fn validate_live(&self, dry_run: bool) -> Result<(), TradingError> {
        self.validate()?;
        if self.instruments.is_empty() {
            return Err(TradingError::Config("no instruments configured".to_string()));
        }
        if !dry_run && !self.broker.has_credentials() {
            return Err(TradingError::Config(
                "broker.api_key and broker.access_token are required (OI__BROKER__API_KEY, OI__BROKER__ACCESS_TOKEN)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oi_strategy::ThresholdMode;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.strategy.oi_ma_period, 50);
        assert_eq!(config.session.data_refresh_interval_seconds, 180);
        assert_eq!(config.session.timeframe().unwrap(), Timeframe::Minute3);
    }

    #[test]
    fn test_signal_params_follow_mode() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.signal_params().mode,
            ThresholdMode::MovingAveragePct { .. }
        ));

        config.strategy.mode = ThresholdModeName::Absolute;
        match config.signal_params().mode {
            ThresholdMode::Absolute { sensitivity, feeling } => {
                assert_eq!(sensitivity, 0.01);
                assert_eq!(feeling, 3_000_000.0);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn test_risk_config_uses_lot_size() {
        let config = AppConfig::default();
        let risk = config.risk_config(50);
        assert_eq!(risk.quantity, dec!(50));
        assert_eq!(risk.max_daily_trades, 30);
        assert_eq!(risk.bands.take_profit_pct, dec!(0.30));
    }

    #[test]
    fn test_session_window_parsing() {
        let mut session = SessionSettings::default();
        let window = session.window().unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(9, 15, 0).unwrap());

        session.trading_end_time = "09:00".to_string();
        assert!(session.window().is_err());

        session.trading_end_time = "quarter past".to_string();
        assert!(session.window().is_err());
    }

    #[test]
    fn test_rejects_duplicate_instruments() {
        let mut config = AppConfig::default();
        let instrument = InstrumentSettings {
            symbol: "X".to_string(),
            instrument_token: 1,
            exchange: default_exchange(),
            lot_size: 25,
        };
        config.instruments = vec![instrument.clone(), instrument];
        assert!(config.validate().is_err());
    }

    fn master() -> InstrumentMaster {
        InstrumentMaster::new(vec![oi_core::types::InstrumentInfo {
            instrument_token: 12073986,
            symbol: "NIFTY2470424000CE".to_string(),
            name: "NIFTY".to_string(),
            exchange: "NFO".to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 7, 4),
            strike: 24000.0,
            lot_size: 25,
            instrument_type: "CE".to_string(),
        }])
    }

    #[test]
    fn test_resolve_fills_missing_token() {
        let mut instrument = InstrumentSettings {
            symbol: "NIFTY2470424000CE".to_string(),
            instrument_token: 0,
            exchange: default_exchange(),
            lot_size: 25,
        };
        let today = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();

        let dte = instrument.resolve(&master(), today).unwrap();
        assert_eq!(instrument.instrument_token, 12073986);
        assert_eq!(dte, Some(2));
        assert!(AppConfig::default().selection.dte_window().contains(2));
    }

    #[test]
    fn test_resolve_rejects_mismatched_token() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        let mut wrong_symbol = InstrumentSettings {
            symbol: "NIFTY2470424100CE".to_string(),
            instrument_token: 12073986,
            exchange: default_exchange(),
            lot_size: 25,
        };
        assert!(wrong_symbol.resolve(&master(), today).is_err());

        let mut unknown = InstrumentSettings {
            symbol: "BANKNIFTY".to_string(),
            instrument_token: 0,
            exchange: default_exchange(),
            lot_size: 15,
        };
        assert!(unknown.resolve(&master(), today).is_err());
        assert_eq!(unknown.instrument_token, 0);
    }

    #[test]
    fn test_selection_validation() {
        let mut config = AppConfig::default();
        config.selection.min_dte = 5;
        assert!(config.validate().is_err());

        config.selection.min_dte = 1;
        config.selection.max_strikes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_live_requires_credentials_unless_dry_run() {
        let mut config = AppConfig::default();
        config.instruments.push(InstrumentSettings {
            symbol: "X".to_string(),
            instrument_token: 1,
            exchange: default_exchange(),
            lot_size: 25,
        });
        assert!(config.validate_live(false).is_err());
        assert!(config.validate_live(true).is_ok());

        config.broker.api_key = "key".to_string();
        config.broker.access_token = "token".to_string();
        assert!(config.validate_live(false).is_ok());
    }
}
