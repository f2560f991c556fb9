//! Threshold parameters.

use serde::{Deserialize, Serialize};

use oi_core::error::StrategyError;

/// How entry and exit thresholds are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Fixed thresholds from two tunables:
    /// entry `-0.1*s*f`, doi exit `-s*f`, d2oi exit `-0.1*s*f`.
    Absolute { sensitivity: f64, feeling: f64 },
    /// Thresholds scale with the instrument's OI baseline: `-pct * oi_ma`.
    MovingAveragePct {
        entry_threshold_pct: f64,
        exit_doi_threshold_pct: f64,
        exit_d2oi_threshold_pct: f64,
    },
}

/// Concrete thresholds for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub entry: f64,
    pub exit_doi: f64,
    pub exit_d2oi: f64,
}

/// Signal evaluator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    pub mode: ThresholdMode,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self::moving_average_pct(0.005, 0.001, 0.005)
    }
}

impl SignalParams {
    pub fn absolute(sensitivity: f64, feeling: f64) -> Self {
        Self {
            mode: ThresholdMode::Absolute {
                sensitivity,
                feeling,
            },
        }
    }

    pub fn moving_average_pct(entry: f64, exit_doi: f64, exit_d2oi: f64) -> Self {
        Self {
            mode: ThresholdMode::MovingAveragePct {
                entry_threshold_pct: entry,
                exit_doi_threshold_pct: exit_doi,
                exit_d2oi_threshold_pct: exit_d2oi,
            },
        }
    }

    /// Whether thresholds depend on the OI moving average.
    pub fn needs_moving_average(&self) -> bool {
        matches!(self.mode, ThresholdMode::MovingAveragePct { .. })
    }

    /// Thresholds for a bar with the given OI moving average.
    ///
    /// `None` when the mode needs the moving average and it is still NaN.
    pub fn thresholds(&self, oi_moving_average: f64) -> Option<Thresholds> {
        match self.mode {
            ThresholdMode::Absolute {
                sensitivity,
                feeling,
            } => {
                let scale = sensitivity * feeling;
                Some(Thresholds {
                    entry: -0.1 * scale,
                    exit_doi: -scale,
                    exit_d2oi: -0.1 * scale,
                })
            }
            ThresholdMode::MovingAveragePct {
                entry_threshold_pct,
                exit_doi_threshold_pct,
                exit_d2oi_threshold_pct,
            } => {
                if oi_moving_average.is_nan() {
                    return None;
                }
                Some(Thresholds {
                    entry: -entry_threshold_pct * oi_moving_average,
                    exit_doi: -exit_doi_threshold_pct * oi_moving_average,
                    exit_d2oi: -exit_d2oi_threshold_pct * oi_moving_average,
                })
            }
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(StrategyError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )))
            }
        };

        match self.mode {
            ThresholdMode::Absolute {
                sensitivity,
                feeling,
            } => {
                check("sensitivity", sensitivity)?;
                check("feeling", feeling)
            }
            ThresholdMode::MovingAveragePct {
                entry_threshold_pct,
                exit_doi_threshold_pct,
                exit_d2oi_threshold_pct,
            } => {
                check("entry_threshold_pct", entry_threshold_pct)?;
                check("exit_doi_threshold_pct", exit_doi_threshold_pct)?;
                check("exit_d2oi_threshold_pct", exit_d2oi_threshold_pct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_thresholds() {
        let t = SignalParams::absolute(0.01, 3_000_000.0).thresholds(f64::NAN).unwrap();
        assert!((t.entry - -3_000.0).abs() < 1e-9);
        assert!((t.exit_doi - -30_000.0).abs() < 1e-9);
        assert!((t.exit_d2oi - -3_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_pct_thresholds_scale_with_baseline() {
        let params = SignalParams::default();
        let t = params.thresholds(1_000_000.0).unwrap();
        assert!((t.entry - -5_000.0).abs() < 1e-9);
        assert!((t.exit_doi - -1_000.0).abs() < 1e-9);
        assert!((t.exit_d2oi - -5_000.0).abs() < 1e-9);

        assert!(params.thresholds(f64::NAN).is_none());
    }

    #[test]
    fn test_validation() {
        assert!(SignalParams::default().validate().is_ok());
        assert!(SignalParams::absolute(-0.01, 1.0).validate().is_err());
        assert!(SignalParams::moving_average_pct(0.005, f64::NAN, 0.005)
            .validate()
            .is_err());
    }

    #[test]
    fn test_mode_serde_tag() {
        let json = r#"{"mode":{"mode":"absolute","sensitivity":0.01,"feeling":3000000.0}}"#;
        let params: SignalParams = serde_json::from_str(json).unwrap();
        assert_eq!(params, SignalParams::absolute(0.01, 3_000_000.0));
    }
}
