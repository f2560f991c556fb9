//! First and second time-derivatives of open interest.
//!
//! With `T` the sampling interval (the venue's OI refresh cadence):
//!
//! ```text
//! doi[i]  = (oi[i] - oi[i-1]) / T                 (0 when i < 1)
//! d2oi[i] = (oi[i] + oi[i-2] - 2 * oi[i-1]) / T^2 (0 when i < 2)
//! ```
//!
//! The zero fill at stream start is part of the contract, not an error.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use oi_core::error::IndicatorError;
use oi_core::traits::{Indicator, StreamingIndicator};
use oi_core::types::{Bar, DerivativeSample};

use crate::moving_average::{window_mean, RollingMean, Sma};

/// Derivative engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivativeConfig {
    /// Length of one sampling interval, in the time unit thresholds are quoted in
    pub sampling_interval: f64,
    /// Bars in the trailing open-interest mean
    pub ma_window: usize,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 3.0,
            ma_window: 30,
        }
    }
}

impl DerivativeConfig {
    pub fn new(sampling_interval: f64, ma_window: usize) -> Self {
        Self {
            sampling_interval,
            ma_window,
        }
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        if !self.sampling_interval.is_finite() || self.sampling_interval <= 0.0 {
            return Err(IndicatorError::InvalidParameter(format!(
                "sampling interval must be positive, got {}",
                self.sampling_interval
            )));
        }
        if self.ma_window == 0 {
            return Err(IndicatorError::InvalidParameter(
                "moving average window must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[inline]
fn first_difference(oi: f64, prev: f64, t: f64) -> f64 {
    (oi - prev) / t
}

#[inline]
fn second_difference(oi: f64, prev: f64, prev2: f64, t: f64) -> f64 {
    (oi + prev2 - 2.0 * prev) / (t * t)
}

/// Compute the derivative sample at `at_index` of `history`.
///
/// Only `history[..=at_index]` is read. The moving average is NaN until
/// `ma_window` bars are available.
pub fn compute_derivatives(
    history: &[Bar],
    at_index: usize,
    config: &DerivativeConfig,
) -> Result<DerivativeSample, IndicatorError> {
    config.validate()?;
    let bar = history.get(at_index).ok_or(IndicatorError::IndexOutOfRange {
        index: at_index,
        len: history.len(),
    })?;

    let t = config.sampling_interval;
    let oi = |i: usize| history[i].oi();

    let doi = if at_index >= 1 {
        first_difference(oi(at_index), oi(at_index - 1), t)
    } else {
        0.0
    };
    let d2oi = if at_index >= 2 {
        second_difference(oi(at_index), oi(at_index - 1), oi(at_index - 2), t)
    } else {
        0.0
    };

    let window = config.ma_window;
    let oi_moving_average = if at_index + 1 >= window {
        window_mean(history[at_index + 1 - window..=at_index].iter().map(Bar::oi), window)
    } else {
        f64::NAN
    };

    Ok(DerivativeSample {
        timestamp: bar.timestamp,
        open_interest: bar.oi(),
        doi,
        d2oi,
        oi_moving_average,
    })
}

/// Compute a sample for every bar of `history`.
///
/// Same values as [`compute_derivatives`] at each index, with the moving
/// average computed once over the whole series.
pub fn compute_series(
    history: &[Bar],
    config: &DerivativeConfig,
) -> Result<Vec<DerivativeSample>, IndicatorError> {
    config.validate()?;
    let t = config.sampling_interval;
    let oi: Vec<f64> = history.iter().map(Bar::oi).collect();
    let averages = Sma::new(config.ma_window)?.calculate(&oi);

    Ok(history
        .iter()
        .enumerate()
        .map(|(i, bar)| DerivativeSample {
            timestamp: bar.timestamp,
            open_interest: oi[i],
            doi: if i >= 1 { first_difference(oi[i], oi[i - 1], t) } else { 0.0 },
            d2oi: if i >= 2 {
                second_difference(oi[i], oi[i - 1], oi[i - 2], t)
            } else {
                0.0
            },
            oi_moving_average: averages[i],
        })
        .collect())
}

/// Streaming derivative engine for one instrument.
///
/// Holds only the last three open-interest values and the averaging window,
/// and produces the same samples as [`compute_derivatives`] over the same
/// bars. Bars must arrive with strictly increasing timestamps.
#[derive(Debug, Clone)]
pub struct DerivativeEngine {
    config: DerivativeConfig,
    recent: VecDeque<f64>,
    moving_average: RollingMean,
    last_timestamp: Option<i64>,
    bars_seen: usize,
}

impl DerivativeEngine {
    pub fn new(config: DerivativeConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        Ok(Self {
            moving_average: RollingMean::new(config.ma_window)?,
            config,
            recent: VecDeque::with_capacity(3),
            last_timestamp: None,
            bars_seen: 0,
        })
    }

    pub fn config(&self) -> &DerivativeConfig {
        &self.config
    }

    /// Number of bars accepted since creation or the last reset.
    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Feed the next bar and get its sample.
    ///
    /// A bar at or before the previous timestamp is rejected and leaves the
    /// engine unchanged.
    pub fn update(&mut self, bar: &Bar) -> Result<DerivativeSample, IndicatorError> {
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                return Err(IndicatorError::OutOfOrder {
                    timestamp: bar.timestamp,
                    previous,
                });
            }
        }

        let oi = bar.oi();
        let t = self.config.sampling_interval;

        let doi = match self.recent.back() {
            Some(&prev) => first_difference(oi, prev, t),
            None => 0.0,
        };
        let d2oi = if self.recent.len() >= 2 {
            let prev = self.recent[self.recent.len() - 1];
            let prev2 = self.recent[self.recent.len() - 2];
            second_difference(oi, prev, prev2, t)
        } else {
            0.0
        };

        if self.recent.len() == 3 {
            self.recent.pop_front();
        }
        self.recent.push_back(oi);
        self.moving_average.update(oi);
        self.last_timestamp = Some(bar.timestamp);
        self.bars_seen += 1;

        Ok(DerivativeSample {
            timestamp: bar.timestamp,
            open_interest: oi,
            doi,
            d2oi,
            oi_moving_average: self.moving_average.value_or_nan(),
        })
    }

    /// Forget all history, as at the start of a new stream.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.moving_average.reset();
        self.last_timestamp = None;
        self.bars_seen = 0;
    }
}
