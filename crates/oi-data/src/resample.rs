//! Aggregation of fine bars to the open-interest refresh cadence.

use oi_core::types::Bar;

/// Bucket bars into fixed windows of `cadence_minutes`, aligned to the Unix
/// epoch, keeping the first open, max high, min low, last close, summed
/// volume and last open interest. Each output bar carries its bucket start
/// as timestamp.
///
/// Input must be time-ordered. A cadence of 0 or 1 minute returns the
/// input unchanged.
pub fn aggregate_to_cadence(bars: &[Bar], cadence_minutes: u32) -> Vec<Bar> {
    if cadence_minutes <= 1 {
        return bars.to_vec();
    }
    let window = cadence_minutes as i64 * 60_000;

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len() / cadence_minutes as usize + 1);
    for bar in bars {
        let bucket = bar.timestamp.div_euclid(window) * window;
        match out.last_mut() {
            Some(current) if current.timestamp == bucket => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume += bar.volume;
                current.open_interest = bar.open_interest;
            }
            _ => out.push(Bar {
                timestamp: bucket,
                ..*bar
            }),
        }
    }
    out
}
