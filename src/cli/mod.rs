//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use oi_config::{AppConfig, ThresholdModeName};
use chrono::NaiveDate;
use oi_strategy::MovementType;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oi-trader")]
#[command(author, version, about = "Open-interest derivative signal engine")]
pub struct Cli {
    /// Configuration file path (defaults to config/default.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level, overriding the configuration file
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a bar file through the strategy and position state machine
    Backtest(BacktestArgs),
    /// Report signal statistics without trading
    Analyze(AnalyzeArgs),
    /// Poll the broker during market hours and trade
    Live(LiveArgs),
    /// Write a synthetic bar file
    Generate(GenerateArgs),
    /// Pick option contracts around the money from the instrument master
    Strikes(StrikesArgs),
    /// Validate configuration and print the effective settings
    ValidateConfig,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Absolute,
    MovingAveragePct,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MovementArg {
    /// Calls at and above the spot
    ShortCovering,
    /// Puts at and below the spot
    LongUnwinding,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SyntheticKind {
    /// Trending, sideways and volatile segments
    Regimes,
    /// Steady OI decline followed by an accelerating unwind
    ShortCovering,
}

/// Per-run overrides of the strategy and risk configuration.
#[derive(clap::Args)]
pub struct StrategyOverrides {
    /// Threshold mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Absolute mode sensitivity
    #[arg(long)]
    pub sensitivity: Option<f64>,

    /// Absolute mode feeling multiplier
    #[arg(long)]
    pub feeling: Option<f64>,

    /// Entry threshold as a fraction of the OI moving average
    #[arg(long)]
    pub entry_pct: Option<f64>,

    /// First-derivative exit threshold as a fraction of the OI moving average
    #[arg(long)]
    pub exit_doi_pct: Option<f64>,

    /// Second-derivative exit threshold as a fraction of the OI moving average
    #[arg(long)]
    pub exit_d2oi_pct: Option<f64>,

    /// Bars in the OI moving average
    #[arg(long)]
    pub ma_period: Option<usize>,

    /// Sampling interval used to scale the derivatives
    #[arg(long)]
    pub sampling_interval: Option<f64>,

    /// Stop-loss fraction below entry
    #[arg(long)]
    pub stop_loss: Option<Decimal>,

    /// Take-profit fraction above entry
    #[arg(long)]
    pub take_profit: Option<Decimal>,

    /// Maximum entries per session
    #[arg(long)]
    pub max_daily_trades: Option<u32>,
}

impl StrategyOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        let s = &mut config.strategy;
        if let Some(mode) = self.mode {
            s.mode = match mode {
                ModeArg::Absolute => ThresholdModeName::Absolute,
                ModeArg::MovingAveragePct => ThresholdModeName::MovingAveragePct,
            };
        }
        if let Some(v) = self.sensitivity {
            s.sensitivity = v;
        }
        if let Some(v) = self.feeling {
            s.feeling = v;
        }
        if let Some(v) = self.entry_pct {
            s.entry_threshold_pct = v;
        }
        if let Some(v) = self.exit_doi_pct {
            s.exit_doi_threshold_pct = v;
        }
        if let Some(v) = self.exit_d2oi_pct {
            s.exit_d2oi_threshold_pct = v;
        }
        if let Some(v) = self.ma_period {
            s.oi_ma_period = v;
        }
        if let Some(v) = self.sampling_interval {
            s.sampling_interval = v;
        }

        let r = &mut config.risk;
        if let Some(v) = self.stop_loss {
            r.stop_loss_pct = v;
        }
        if let Some(v) = self.take_profit {
            r.take_profit_pct = v;
        }
        if let Some(v) = self.max_daily_trades {
            r.max_daily_trades = v;
        }
    }
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Bar file (CSV: timestamp, open, high, low, close, volume[, oi])
    #[arg(short, long)]
    pub data: PathBuf,

    /// Instrument name used in orders and the report
    #[arg(short, long, default_value = "INSTRUMENT")]
    pub symbol: String,

    /// Initial cash, overriding [backtest].initial_cash
    #[arg(long)]
    pub cash: Option<Decimal>,

    /// Commission fraction, overriding [backtest].commission_pct
    #[arg(long)]
    pub commission: Option<Decimal>,

    /// Contracts per entry
    #[arg(long, default_value = "25")]
    pub lot_size: u32,

    /// Aggregate bars to this many minutes first
    #[arg(long)]
    pub resample: Option<u32>,

    #[command(flatten)]
    pub overrides: StrategyOverrides,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save results to file (.json, .csv for the equity curve, text otherwise)
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// Bar file to analyze
    #[arg(short, long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
    pub data: Option<PathBuf>,

    /// Analyze generated data instead of a file
    #[arg(long, value_enum)]
    pub synthetic: Option<SyntheticKind>,

    /// Seed for generated data
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Aggregate bars to this many minutes first
    #[arg(long)]
    pub resample: Option<u32>,

    #[command(flatten)]
    pub overrides: StrategyOverrides,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(clap::Args)]
pub struct LiveArgs {
    /// Simulate fills with the paper broker instead of placing real orders
    #[arg(long)]
    pub dry_run: bool,

    /// Read bars from a file instead of the broker (dry run only)
    #[arg(long, requires = "dry_run")]
    pub data: Option<PathBuf>,

    /// Paper broker cash for dry runs
    #[arg(long)]
    pub cash: Option<Decimal>,
}

#[derive(clap::Args)]
pub struct GenerateArgs {
    /// Output CSV path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Kind of data to generate
    #[arg(long, value_enum, default_value = "regimes")]
    pub kind: SyntheticKind,

    /// Bars per regime
    #[arg(long, default_value = "400")]
    pub bars: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(clap::Args)]
pub struct StrikesArgs {
    /// Spot price of the underlying
    #[arg(long)]
    pub spot: f64,

    /// Underlying name, overriding [selection].underlying
    #[arg(long)]
    pub underlying: Option<String>,

    /// Which side is expected to unwind
    #[arg(long, value_enum)]
    pub movement: Option<MovementArg>,

    /// Number of strikes to pick
    #[arg(long)]
    pub max_strikes: Option<usize>,

    /// Saved instrument master CSV instead of downloading it
    #[arg(long)]
    pub master: Option<PathBuf>,

    /// Trading date (YYYY-MM-DD), defaulting to today in exchange time
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl StrikesArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let s = &mut config.selection;
        if let Some(underlying) = &self.underlying {
            s.underlying = underlying.clone();
        }
        if let Some(movement) = self.movement {
            s.movement = match movement {
                MovementArg::ShortCovering => MovementType::ShortCovering,
                MovementArg::LongUnwinding => MovementType::LongUnwinding,
            };
        }
        if let Some(v) = self.max_strikes {
            s.max_strikes = v;
        }
    }
}
