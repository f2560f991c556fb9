//! Bars carrying open interest, and the per-instrument bar history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::Timeframe;
use crate::error::DataError;

/// One sampled observation of an instrument.
///
/// Prices are `f64` for fast derivative math; volume and open interest are
/// counts of contracts. Open interest is only refreshed by the venue on a
/// fixed cadence, so bars should be aggregated to that cadence upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub open_interest: u64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
        open_interest: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            open_interest,
        }
    }

    /// Check price positivity and `low <= open, close <= high`.
    pub fn validate(&self) -> Result<(), DataError> {
        let invalid = |reason: String| DataError::InvalidBar {
            timestamp: self.timestamp,
            reason,
        };

        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be a positive number, got {value}")));
            }
        }

        if self.low > self.high {
            return Err(invalid(format!("low {} above high {}", self.low, self.high)));
        }
        if self.open < self.low || self.open > self.high {
            return Err(invalid(format!(
                "open {} outside [{}, {}]",
                self.open, self.low, self.high
            )));
        }
        if self.close < self.low || self.close > self.high {
            return Err(invalid(format!(
                "close {} outside [{}, {}]",
                self.close, self.low, self.high
            )));
        }
        Ok(())
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Open interest as a float for derivative math.
    #[inline]
    pub fn oi(&self) -> f64 {
        self.open_interest as f64
    }
}

/// Bar history for one instrument, strictly ordered by timestamp.
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    bars: VecDeque<Bar>,
    /// Maximum retained bars (0 = unlimited)
    capacity: usize,
}

impl BarSeries {
    /// Create a new empty bar series.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars: VecDeque::new(),
            capacity: 0,
        }
    }

    /// Create a bar series that keeps at most `capacity` bars, dropping the oldest.
    pub fn with_capacity(symbol: impl Into<String>, timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a bar, rejecting duplicated or out-of-order timestamps.
    pub fn try_push(&mut self, bar: Bar) -> Result<(), DataError> {
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return Err(DataError::OutOfOrder {
                    line: (self.bars.len() + 1) as u64,
                    timestamp: bar.timestamp,
                    previous: last.timestamp,
                });
            }
        }
        if self.capacity > 0 && self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        Ok(())
    }

    /// Append only the bars newer than the last retained one.
    ///
    /// Returns the bars that were actually appended, in order. This is how a
    /// polling driver merges overlapping fetch windows.
    pub fn merge_newer(&mut self, bars: impl IntoIterator<Item = Bar>) -> Vec<Bar> {
        let mut appended = Vec::new();
        for bar in bars {
            if self.try_push(bar).is_ok() {
                appended.push(bar);
            }
        }
        appended
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get the last bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}
