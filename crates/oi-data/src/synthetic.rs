//! Synthetic option bars for demos and tests.
//!
//! Timestamps follow NSE session hours (09:15 to 15:30 IST, weekdays).

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use oi_core::types::Bar;

const IST_OFFSET_MINUTES: i64 = 330;

/// `count` bar timestamps of `interval_minutes`, walking session hours from
/// the open of `start_date`.
pub fn session_timestamps(start_date: NaiveDate, interval_minutes: u32, count: usize) -> Vec<i64> {
    let open = NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN);
    let close = NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN);
    let step = Duration::minutes(interval_minutes.max(1) as i64);

    let mut out = Vec::with_capacity(count);
    let mut date = start_date;
    while out.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let mut local = date.and_time(open);
            while local.time() < close && out.len() < count {
                let utc = local - Duration::minutes(IST_OFFSET_MINUTES);
                out.push(Utc.from_utc_datetime(&utc).timestamp_millis());
                local += step;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    out
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn bar_around(timestamp: i64, open: f64, close: f64, wick: f64, volume: u64, oi: u64) -> Bar {
    let (open, close) = (round2(open.max(0.05)), round2(close.max(0.05)));
    Bar::new(
        timestamp,
        open,
        round2(open.max(close) + wick.abs()),
        round2((open.min(close) - wick.abs()).max(0.05)),
        close,
        volume,
        oi,
    )
}

/// Parameters for [`market_regimes`].
#[derive(Debug, Clone)]
pub struct RegimeConfig {
    /// Bars in each of the trending, sideways and volatile regimes
    pub bars_per_regime: usize,
    pub start_date: NaiveDate,
    pub interval_minutes: u32,
    pub base_price: f64,
    pub base_oi: f64,
    pub seed: u64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            bars_per_regime: 400,
            start_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap_or_default(),
            interval_minutes: 3,
            base_price: 50.0,
            base_oi: 1_500_000.0,
            seed: 42,
        }
    }
}

/// Trending, then sideways, then volatile market, reproducible from the seed.
pub fn market_regimes(config: &RegimeConfig) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.bars_per_regime.max(1);
    let timestamps = session_timestamps(config.start_date, config.interval_minutes, n * 3);

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut prev_close = config.base_price;
    for (i, &ts) in timestamps.iter().enumerate() {
        let (price_level, volatility, oi_level) = if i < n {
            let progress = i as f64 / n as f64;
            (10.0 * progress, 0.5, 100_000.0 * progress)
        } else if i < 2 * n {
            let j = (i - n) as f64;
            (10.0 + 2.0 * (j / 10.0).sin(), 0.3, 100_000.0 + 20_000.0 * (j / 15.0).sin())
        } else {
            (
                12.0 + rng.gen_range(-5.0..5.0),
                1.5,
                120_000.0 + rng.gen_range(-25_000.0..25_000.0),
            )
        };

        let close = config.base_price + price_level + rng.gen_range(-volatility..volatility);
        let open = prev_close + rng.gen_range(-volatility / 4.0..volatility / 4.0);
        let wick = rng.gen_range(0.0..volatility / 2.0);
        let volume = (1_000.0 + 5_000.0 * (close - open).abs() + rng.gen_range(-500.0..500.0))
            .max(500.0) as u64;
        let oi = (config.base_oi + oi_level + rng.gen_range(-10_000.0..10_000.0)).max(100_000.0) as u64;

        bars.push(bar_around(ts, open, close, wick, volume, oi));
        prev_close = close;
    }
    bars
}

/// Deterministic short-covering episode.
///
/// Flat open interest for `baseline_bars`, a steady decline for
/// `steady_bars`, a sharply accelerating decline with a price spike for
/// `acceleration_bars`, then flat open interest again.
#[derive(Debug, Clone)]
pub struct ShortCoveringScenario {
    pub start_date: NaiveDate,
    pub interval_minutes: u32,
    pub base_price: f64,
    pub baseline_oi: u64,
    pub baseline_bars: usize,
    pub steady_bars: usize,
    /// OI drop per bar during the steady decline
    pub steady_decline: u64,
    pub acceleration_bars: usize,
    /// Increase of the per-bar drop at each accelerating bar
    pub acceleration_step: u64,
    pub recovery_bars: usize,
}

impl Default for ShortCoveringScenario {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap_or_default(),
            interval_minutes: 3,
            base_price: 100.0,
            baseline_oi: 1_000_000,
            baseline_bars: 50,
            steady_bars: 10,
            steady_decline: 300,
            acceleration_bars: 3,
            acceleration_step: 60_000,
            recovery_bars: 5,
        }
    }
}

impl ShortCoveringScenario {
    /// Index of the first accelerating bar.
    pub fn onset_index(&self) -> usize {
        self.baseline_bars + self.steady_bars
    }

    pub fn len(&self) -> usize {
        self.onset_index() + self.acceleration_bars + self.recovery_bars
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generate(&self) -> Vec<Bar> {
        let timestamps = session_timestamps(self.start_date, self.interval_minutes, self.len());
        let mut oi = self.baseline_oi;
        let mut price = self.base_price;

        timestamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| {
                let open = price;
                if i < self.baseline_bars {
                    price = self.base_price + if i % 2 == 0 { 0.1 } else { -0.1 };
                } else if i < self.onset_index() {
                    oi = oi.saturating_sub(self.steady_decline);
                    price += 0.05;
                } else if i < self.onset_index() + self.acceleration_bars {
                    let k = (i - self.onset_index() + 1) as u64;
                    oi = oi.saturating_sub(self.acceleration_step * k);
                    price *= 1.08;
                }
                bar_around(ts, open, price, 0.2, 1_000 + i as u64 * 10, oi)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_timestamps_skip_weekends_and_nights() {
        // 2024-07-05 is a Friday
        let start = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        let ts = session_timestamps(start, 3, 130);

        assert_eq!(ts.len(), 130);
        let first = Utc.timestamp_millis_opt(ts[0]).unwrap();
        assert_eq!(first.to_rfc3339(), "2024-07-05T03:45:00+00:00");
        // 125 bars per session, the 126th opens on Monday
        let monday = Utc.timestamp_millis_opt(ts[125]).unwrap();
        assert_eq!(monday.to_rfc3339(), "2024-07-08T03:45:00+00:00");
    }

    #[test]
    fn test_regimes_are_reproducible_and_valid() {
        let config = RegimeConfig {
            bars_per_regime: 50,
            ..Default::default()
        };
        let a = market_regimes(&config);
        let b = market_regimes(&config);

        assert_eq!(a.len(), 150);
        assert_eq!(a, b);
        for bar in &a {
            bar.validate().unwrap();
        }
        assert!(a.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let other = market_regimes(&RegimeConfig { seed: 7, ..config });
        assert_ne!(a, other);
    }

    #[test]
    fn test_short_covering_shape() {
        let scenario = ShortCoveringScenario::default();
        let bars = scenario.generate();
        let onset = scenario.onset_index();

        assert_eq!(bars.len(), 68);
        assert_eq!(bars[onset - 1].open_interest, 1_000_000 - 10 * 300);
        assert_eq!(bars[onset].open_interest, 997_000 - 60_000);
        assert_eq!(bars[onset + 1].open_interest, 937_000 - 120_000);
        assert_eq!(bars[onset + 3].open_interest, bars[onset + 2].open_interest);
        assert!(bars[onset + 2].close > bars[onset - 1].close * 1.2);
        for bar in &bars {
            bar.validate().unwrap();
        }
    }
}
