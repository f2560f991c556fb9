//! Pure classification of one derivative sample.

use oi_core::types::{DerivativeSample, ExitReason, PositionState, SignalType};

use crate::params::{SignalParams, Thresholds};

/// Output of [`evaluate`] for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub signal_type: SignalType,
    pub reason: String,
    /// Set when `signal_type` is SELL
    pub exit_reason: Option<ExitReason>,
    /// Thresholds in force, `None` while the moving average warms up
    pub thresholds: Option<Thresholds>,
}

impl Decision {
    fn hold(reason: impl Into<String>, thresholds: Option<Thresholds>) -> Self {
        Self {
            signal_type: SignalType::Hold,
            reason: reason.into(),
            exit_reason: None,
            thresholds,
        }
    }
}

/// True when the sample satisfies the entry rule.
#[inline]
pub fn classify_entry(sample: &DerivativeSample, thresholds: &Thresholds) -> bool {
    sample.doi < 0.0 && sample.d2oi < thresholds.entry
}

/// The exit rule that fires for the sample, first derivative first.
#[inline]
pub fn classify_exit(sample: &DerivativeSample, thresholds: &Thresholds) -> Option<ExitReason> {
    if sample.doi > thresholds.exit_doi {
        Some(ExitReason::FirstDerivative)
    } else if sample.d2oi > thresholds.exit_d2oi {
        Some(ExitReason::SecondDerivative)
    } else {
        None
    }
}

/// Classify a sample as BUY, SELL or HOLD given the position state.
///
/// Pure: the same inputs always give the same decision.
pub fn evaluate(
    sample: &DerivativeSample,
    position: PositionState,
    params: &SignalParams,
) -> Decision {
    let Some(thresholds) = params.thresholds(sample.oi_moving_average) else {
        return Decision::hold("open interest moving average warming up", None);
    };

    match position {
        PositionState::Flat => {
            if classify_entry(sample, &thresholds) {
                Decision {
                    signal_type: SignalType::Buy,
                    reason: format!(
                        "open interest unwinding: doi {:.2} < 0, d2oi {:.2} < {:.2}",
                        sample.doi, sample.d2oi, thresholds.entry
                    ),
                    exit_reason: None,
                    thresholds: Some(thresholds),
                }
            } else {
                Decision::hold("no entry condition", Some(thresholds))
            }
        }
        PositionState::Long => match classify_exit(sample, &thresholds) {
            Some(exit) => Decision {
                signal_type: SignalType::Sell,
                reason: exit.as_str().to_string(),
                exit_reason: Some(exit),
                thresholds: Some(thresholds),
            },
            None => Decision::hold("holding position", Some(thresholds)),
        },
    }
}
