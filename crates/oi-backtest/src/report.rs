//! Backtest report generation.

use oi_core::error::TradingError;
use oi_core::types::{Portfolio, SignalType};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{BacktestConfig, BacktestStats, SignalRecord};

const RULE: &str = "═══════════════════════════════════════════════════════════\n";
const SECTION: &str = "───────────────────────────────────────────────────────────\n";

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Configuration used
    pub config: BacktestConfig,
    pub stats: BacktestStats,
    /// Every submitted or suppressed order decision, in bar order
    pub signals: Vec<SignalRecord>,
    /// Final portfolio state
    pub final_portfolio: Portfolio,
}

impl BacktestReport {
    fn count_signals(&self, signal_type: SignalType) -> usize {
        self.signals
            .iter()
            .filter(|s| s.signal_type == signal_type && !s.suppressed)
            .count()
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut s = String::new();

        s.push_str(RULE);
        s.push_str("                     BACKTEST REPORT                        \n");
        s.push_str(RULE);
        s.push_str(&format!("  Instrument:          {}\n\n", self.config.symbol));

        s.push_str("PERFORMANCE\n");
        s.push_str(SECTION);
        s.push_str(&format!("  Starting Value:      {:.2}\n", stats.initial_capital));
        s.push_str(&format!("  Final Value:         {:.2}\n", stats.final_equity));
        s.push_str(&format!("  Total Return:        {:.2}%\n", stats.total_return_pct));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", stats.max_drawdown_pct));
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", stats.sharpe_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", stats.profit_factor));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str(SECTION);
        s.push_str(&format!("  Total Trades:        {}\n", stats.total_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", stats.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", stats.losing_trades));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", stats.win_rate_pct));
        s.push_str(&format!("  Avg Win:             {:.2}\n", stats.avg_win));
        s.push_str(&format!("  Avg Loss:            {:.2}\n", stats.avg_loss));
        s.push_str(&format!("  Gross PnL:           {:.2}\n", stats.gross_pnl));
        s.push_str(&format!("  Commission:          {:.2}\n", stats.total_commission));
        s.push_str(&format!("  Net PnL:             {:.2}\n", stats.net_pnl()));
        if let Some(position) = &stats.open_position {
            s.push_str(&format!(
                "  Open Position:       {} @ {:.2} (marked {:.2})\n",
                position.quantity, position.avg_entry_price, position.current_price
            ));
        }
        s.push('\n');

        s.push_str("SIGNALS\n");
        s.push_str(SECTION);
        s.push_str(&format!("  BUY Orders:          {}\n", self.count_signals(SignalType::Buy)));
        s.push_str(&format!("  SELL Orders:         {}\n", self.count_signals(SignalType::Sell)));
        s.push_str(&format!("  Suppressed Entries:  {}\n", stats.suppressed_entries));
        for (reason, count) in &stats.exit_reasons {
            s.push_str(&format!("  Exit {:<15} {}\n", format!("{reason}:"), count));
        }
        s.push_str(&format!("  Bars Processed:      {}\n", stats.bars_processed));
        s.push('\n');

        s.push_str(RULE);
        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (equity curve only).
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{},{}\n", ts, equity));
        }
        csv
    }

    /// Write the report to `path`: JSON for `.json`, the equity curve for
    /// `.csv`, the text summary otherwise.
    pub fn save(&self, path: &Path) -> Result<(), TradingError> {
        let contents = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self
                .to_json()
                .map_err(|e| TradingError::Serialization(e.to_string()))?,
            Some("csv") => self.equity_to_csv(),
            _ => self.summary(),
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report() -> BacktestReport {
        let mut stats = BacktestStats::new(dec!(100000));
        stats.record_equity(0, dec!(100000));
        stats.record_equity(180_000, dec!(110000));
        stats.finalize(dec!(110000), None);

        BacktestReport {
            config: BacktestConfig::default(),
            stats,
            signals: vec![SignalRecord {
                bar_index: 0,
                timestamp: 0,
                signal_type: SignalType::Buy,
                price: 100.0,
                reason: "entry".to_string(),
                suppressed: false,
            }],
            final_portfolio: Portfolio::new(dec!(110000)),
        }
    }

    #[test]
    fn test_report_summary() {
        let summary = report().summary();
        assert!(summary.contains("Starting Value:      100000.00"));
        assert!(summary.contains("Final Value:         110000.00"));
        assert!(summary.contains("Total Return:        10.00%"));
        assert!(summary.contains("BUY Orders:          1"));
    }

    #[test]
    fn test_save_by_extension() {
        let report = report();
        let dir = std::env::temp_dir();
        let json_path = dir.join(format!("oi-report-{}.json", std::process::id()));
        let csv_path = dir.join(format!("oi-report-{}.csv", std::process::id()));

        report.save(&json_path).unwrap();
        report.save(&csv_path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["stats"]["total_trades"], 0);
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("timestamp,equity\n0,100000\n"));

        std::fs::remove_file(json_path).ok();
        std::fs::remove_file(csv_path).ok();
    }
}
