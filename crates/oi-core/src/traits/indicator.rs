//! Indicator trait definitions.

/// Batch indicator over a slice of values.
pub trait Indicator: Send + Sync {
    type Output;

    /// Calculate one output per input; positions before the first complete
    /// window are NaN.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    fn name(&self) -> &str;
}

/// Indicator updated one value at a time.
pub trait StreamingIndicator: Send + Sync {
    type Output;

    /// Update with a new value and return the current output, if ready.
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    /// Get the current value without adding new data.
    fn current(&self) -> Option<Self::Output>;

    fn reset(&mut self);

    fn is_ready(&self) -> bool;

    fn period(&self) -> usize;

    fn name(&self) -> &str;
}
