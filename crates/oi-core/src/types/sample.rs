use serde::{Deserialize, Serialize};

/// First and second time-derivatives of open interest at one bar, plus the
/// trailing open-interest mean.
///
/// `oi_moving_average` is NaN until the averaging window has filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivativeSample {
    /// Timestamp of the bar the sample was computed at
    pub timestamp: i64,
    /// Open interest at that bar
    pub open_interest: f64,
    pub doi: f64,
    pub d2oi: f64,
    pub oi_moving_average: f64,
}

impl DerivativeSample {
    /// True once the moving average covers a full window.
    #[inline]
    pub fn has_moving_average(&self) -> bool {
        !self.oi_moving_average.is_nan()
    }
}
