//! Simple moving averages.
//!
//! Batch and streaming forms share [`window_mean`], which sums the window
//! oldest-first, so both produce bit-identical values for the same input.

use std::collections::VecDeque;

use oi_core::error::IndicatorError;
use oi_core::traits::{Indicator, StreamingIndicator};

/// Arithmetic mean of a window, summed oldest-first.
#[inline]
pub(crate) fn window_mean(values: impl Iterator<Item = f64>, len: usize) -> f64 {
    values.sum::<f64>() / len as f64
}

/// Simple Moving Average over a whole series.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "SMA period must be greater than 0".to_string(),
            ));
        }
        Ok(Self { period })
    }
}

impl Indicator for Sma {
    type Output = f64;

    /// Output is aligned with the input: index `i` holds the mean of
    /// `data[i + 1 - period..=i]`, NaN while fewer than `period` values exist.
    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        (0..data.len())
            .map(|i| {
                if i + 1 < self.period {
                    f64::NAN
                } else {
                    window_mean(data[i + 1 - self.period..=i].iter().copied(), self.period)
                }
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Streaming simple moving average over the last `period` values.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingMean {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "moving average period must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
        })
    }

    /// Current mean, or NaN until the window is full.
    pub fn value_or_nan(&self) -> f64 {
        self.current().unwrap_or(f64::NAN)
    }
}

impl StreamingIndicator for RollingMean {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.current()
    }

    fn current(&self) -> Option<f64> {
        self.is_ready()
            .then(|| window_mean(self.window.iter().copied(), self.period))
    }

    fn reset(&mut self) {
        self.window.clear();
    }

    fn is_ready(&self) -> bool {
        self.window.len() == self.period
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "RollingMean"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_aligned_with_input() {
        let sma = Sma::new(3).unwrap();
        let result = sma.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(result.len(), 5);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_eq!(&result[2..], &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(Sma::new(0).is_err());
        assert!(RollingMean::new(0).is_err());
    }

    #[test]
    fn test_rolling_mean_matches_batch() {
        let data: Vec<f64> = (0..40).map(|i| 1_000_000.0 - (i * i) as f64 * 37.5).collect();
        let batch = Sma::new(7).unwrap().calculate(&data);

        let mut rolling = RollingMean::new(7).unwrap();
        for (i, &value) in data.iter().enumerate() {
            let streamed = rolling.update(value);
            match streamed {
                Some(v) => assert_eq!(v, batch[i]),
                None => assert!(batch[i].is_nan()),
            }
        }
    }

    #[test]
    fn test_rolling_mean_reset() {
        let mut rolling = RollingMean::new(2).unwrap();
        rolling.update(1.0);
        rolling.update(3.0);
        assert_eq!(rolling.current(), Some(2.0));

        rolling.reset();
        assert!(!rolling.is_ready());
        assert!(rolling.value_or_nan().is_nan());
    }
}
