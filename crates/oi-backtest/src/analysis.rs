//! Signal analysis without trading.
//!
//! Runs the derivative engine over a bar history and reports how often the
//! entry and exit rules fire, how the market behaved after entries and how
//! open interest moved in each market regime. Rules are classified
//! independently of any position.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use tracing::debug;

use oi_core::error::{DataError, TradingError};
use oi_core::types::Bar;
use oi_indicators::compute_series;
use oi_strategy::{classify_entry, classify_exit, OiDerivativeConfig};

/// Bar-to-bar open-interest change counted as large.
const LARGE_OI_CHANGE: f64 = 0.05;
/// Bars in the rolling volatility and trend windows.
const REGIME_WINDOW: usize = 20;
/// Volatility quantile above which a bar is labelled high volatility.
const VOLATILITY_QUANTILE: f64 = 0.7;
/// Window trend beyond which a bar is labelled trending.
const TREND_THRESHOLD: f64 = 0.02;

/// Open-interest behaviour inside one market regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub regime: String,
    pub bars: usize,
    /// Mean bar-to-bar OI change, as a fraction
    pub mean_oi_change: f64,
    pub std_oi_change: f64,
}

/// Output of [`SignalAnalyzer::analyze`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub bars: usize,
    pub oi_min: f64,
    pub oi_max: f64,
    pub oi_mean: f64,
    /// Sample standard deviation
    pub oi_std: f64,
    /// Bars whose OI moved more than 5 % from the previous bar
    pub large_oi_changes: usize,
    /// Pearson correlation of price returns and OI changes
    pub price_oi_correlation: Option<f64>,
    pub volume_oi_correlation: Option<f64>,
    /// Bar indices where the entry rule held
    pub entry_indices: Vec<usize>,
    pub exit_signals: usize,
    /// Entry signals per bar
    pub signal_frequency: f64,
    pub mean_interval_minutes: Option<f64>,
    pub min_interval_minutes: Option<f64>,
    pub max_interval_minutes: Option<f64>,
    /// Mean close-to-close return of the bar after each entry
    pub avg_return_after_entry: Option<f64>,
    /// Fraction of entries followed by a positive return
    pub signal_win_rate: Option<f64>,
    pub regimes: Vec<RegimeStats>,
}

impl AnalysisReport {
    pub fn entry_signals(&self) -> usize {
        self.entry_indices.len()
    }

    pub fn summary(&self) -> String {
        let opt = |v: Option<f64>, scale: f64, unit: &str| match v {
            Some(v) => format!("{:.2}{unit}", v * scale),
            None => "n/a".to_string(),
        };

        let mut s = String::new();
        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                     SIGNAL ANALYSIS                        \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("OPEN INTEREST\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Bars:                {}\n", self.bars));
        s.push_str(&format!("  Range:               {:.0} - {:.0}\n", self.oi_min, self.oi_max));
        s.push_str(&format!("  Mean:                {:.0}\n", self.oi_mean));
        s.push_str(&format!("  Std Dev:             {:.0}\n", self.oi_std));
        s.push_str(&format!("  Large Changes (>5%): {}\n", self.large_oi_changes));
        s.push_str(&format!(
            "  Price/OI Corr:       {}\n",
            opt(self.price_oi_correlation, 1.0, "")
        ));
        s.push_str(&format!(
            "  Volume/OI Corr:      {}\n\n",
            opt(self.volume_oi_correlation, 1.0, "")
        ));

        s.push_str("SIGNALS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Entry Signals:       {}\n", self.entry_signals()));
        s.push_str(&format!("  Exit Signals:        {}\n", self.exit_signals));
        s.push_str(&format!("  Frequency:           {:.4}\n", self.signal_frequency));
        s.push_str(&format!(
            "  Interval (min):      mean {} / min {} / max {}\n",
            opt(self.mean_interval_minutes, 1.0, ""),
            opt(self.min_interval_minutes, 1.0, ""),
            opt(self.max_interval_minutes, 1.0, "")
        ));
        s.push_str(&format!(
            "  Next-Bar Return:     {}\n",
            opt(self.avg_return_after_entry, 100.0, "%")
        ));
        s.push_str(&format!(
            "  Signal Win Rate:     {}\n\n",
            opt(self.signal_win_rate, 100.0, "%")
        ));

        if !self.regimes.is_empty() {
            s.push_str("REGIMES\n");
            s.push_str("───────────────────────────────────────────────────────────\n");
            for regime in &self.regimes {
                s.push_str(&format!(
                    "  {:<16} {:>5} bars  OI chg {:+.3}% (sd {:.3}%)\n",
                    regime.regime,
                    regime.bars,
                    regime.mean_oi_change * 100.0,
                    regime.std_oi_change * 100.0
                ));
            }
            s.push('\n');
        }
        s
    }
}

/// Computes signal statistics over a bar history.
#[derive(Debug, Clone)]
pub struct SignalAnalyzer {
    config: OiDerivativeConfig,
}

impl SignalAnalyzer {
    pub fn new(config: OiDerivativeConfig) -> Result<Self, TradingError> {
        config.derivative.validate()?;
        config.params.validate()?;
        Ok(Self { config })
    }

    pub fn analyze(&self, bars: &[Bar]) -> Result<AnalysisReport, TradingError> {
        if bars.is_empty() {
            return Err(DataError::NoDataAvailable.into());
        }

        let samples = compute_series(bars, &self.config.derivative)?;
        let mut entry_indices = Vec::new();
        let mut exit_signals = 0;
        for (i, sample) in samples.iter().enumerate() {
            let Some(thresholds) = self.config.params.thresholds(sample.oi_moving_average) else {
                continue;
            };
            if classify_entry(sample, &thresholds) {
                entry_indices.push(i);
            }
            if classify_exit(sample, &thresholds).is_some() {
                exit_signals += 1;
            }
        }
        debug!(bars = bars.len(), entries = entry_indices.len(), exits = exit_signals, "Signals classified");

        let oi: Vec<f64> = bars.iter().map(Bar::oi).collect();
        let oi_changes = pct_changes(&oi);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns = pct_changes(&closes);
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

        let intervals: Vec<f64> = entry_indices
            .windows(2)
            .map(|w| (bars[w[1]].timestamp - bars[w[0]].timestamp) as f64 / 60_000.0)
            .collect();

        let next_returns: Vec<f64> = entry_indices
            .iter()
            .filter_map(|&i| returns.get(i).copied())
            .collect();

        Ok(AnalysisReport {
            bars: bars.len(),
            oi_min: oi.iter().copied().fold(f64::INFINITY, f64::min),
            oi_max: oi.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            oi_mean: mean(&oi).unwrap_or(0.0),
            oi_std: sample_std(&oi).unwrap_or(0.0),
            large_oi_changes: oi_changes.iter().filter(|c| c.abs() > LARGE_OI_CHANGE).count(),
            price_oi_correlation: pearson(&returns, &oi_changes),
            volume_oi_correlation: pearson(&volumes, &oi),
            signal_frequency: entry_indices.len() as f64 / bars.len() as f64,
            mean_interval_minutes: mean(&intervals),
            min_interval_minutes: intervals.iter().copied().reduce(f64::min),
            max_interval_minutes: intervals.iter().copied().reduce(f64::max),
            avg_return_after_entry: mean(&next_returns),
            signal_win_rate: (!next_returns.is_empty()).then(|| {
                next_returns.iter().filter(|r| **r > 0.0).count() as f64 / next_returns.len() as f64
            }),
            regimes: regime_breakdown(&closes, &oi_changes),
            entry_indices,
            exit_signals,
        })
    }
}

/// `v[i] / v[i-1] - 1` for each `i >= 1`; zero where the base is zero.
fn pct_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// `None` for the NaN statrs returns on too few samples.
fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn mean(values: &[f64]) -> Option<f64> {
    defined(values.mean())
}

/// Sample standard deviation; `None` below two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    defined(values.std_dev())
}

/// Pearson correlation over the common prefix of `x` and `y`.
fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    let denom = x.std_dev() * y.std_dev();
    if denom.is_nan() || denom <= 0.0 {
        return None;
    }
    defined(x.covariance(y) / denom)
}

fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    defined(Data::new(values.to_vec()).quantile(q))
}

/// Label each bar with a full trailing window and group its OI change.
///
/// `oi_changes[i]` is the change into bar `i + 1`.
fn regime_breakdown(closes: &[f64], oi_changes: &[f64]) -> Vec<RegimeStats> {
    if closes.len() <= REGIME_WINDOW {
        return Vec::new();
    }
    let returns = pct_changes(closes);

    // (bar index, volatility, trend) for bars with a full window
    let windows: Vec<(usize, f64, f64)> = (REGIME_WINDOW..closes.len())
        .filter_map(|i| {
            let vol = sample_std(&returns[i - REGIME_WINDOW..i])?;
            let first = closes[i - REGIME_WINDOW + 1];
            let trend = if first != 0.0 { (closes[i] - first) / first } else { 0.0 };
            Some((i, vol, trend))
        })
        .collect();
    let vols: Vec<f64> = windows.iter().map(|w| w.1).collect();
    let Some(vol_cut) = quantile(&vols, VOLATILITY_QUANTILE) else {
        return Vec::new();
    };

    const LABELS: [&str; 4] = ["Trending Up", "Trending Down", "Sideways", "High Volatility"];
    let mut grouped: [Vec<f64>; 4] = Default::default();
    for (i, vol, trend) in windows {
        let slot = if vol > vol_cut {
            3
        } else if trend > TREND_THRESHOLD {
            0
        } else if trend < -TREND_THRESHOLD {
            1
        } else {
            2
        };
        grouped[slot].push(oi_changes[i - 1]);
    }

    LABELS
        .iter()
        .zip(grouped.iter())
        .filter(|(_, changes)| !changes.is_empty())
        .map(|(label, changes)| RegimeStats {
            regime: label.to_string(),
            bars: changes.len(),
            mean_oi_change: mean(changes).unwrap_or(0.0),
            std_oi_change: sample_std(changes).unwrap_or(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oi_data::synthetic::{market_regimes, RegimeConfig, ShortCoveringScenario};
    use oi_indicators::DerivativeConfig;
    use oi_strategy::SignalParams;

    fn analyzer() -> SignalAnalyzer {
        SignalAnalyzer::new(OiDerivativeConfig {
            derivative: DerivativeConfig::new(3.0, 50),
            params: SignalParams::moving_average_pct(0.005, 0.001, 0.005),
        })
        .unwrap()
    }

    #[test]
    fn test_short_covering_entries_cluster_at_onset() {
        let scenario = ShortCoveringScenario::default();
        let report = analyzer().analyze(&scenario.generate()).unwrap();
        let onset = scenario.onset_index();

        assert_eq!(report.bars, scenario.len());
        assert_eq!(report.entry_indices, vec![onset, onset + 1, onset + 2]);
        assert_eq!(report.mean_interval_minutes, Some(3.0));
        assert!(report.avg_return_after_entry.unwrap() > 0.0);
        assert!(report.large_oi_changes >= 2);
        assert_eq!(report.oi_max, 1_000_000.0);
    }

    #[test]
    fn test_regimes_cover_all_windowed_bars() {
        let bars = market_regimes(&RegimeConfig::default());
        let report = analyzer().analyze(&bars).unwrap();

        let labelled: usize = report.regimes.iter().map(|r| r.bars).sum();
        assert_eq!(labelled, bars.len() - REGIME_WINDOW);
        assert!(report.summary().contains("SIGNAL ANALYSIS"));
    }

    #[test]
    fn test_empty_history_is_an_error() {
        assert!(matches!(
            analyzer().analyze(&[]),
            Err(TradingError::Data(DataError::NoDataAvailable))
        ));
    }

    #[test]
    fn test_pearson_and_quantile() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5), Some(3.0));
    }
}
