//! Contract selection around the money.
//!
//! Short covering shows up in calls at and above the spot, long unwinding
//! in puts at and below it. The effect is strongest a few days before
//! expiry, so contracts are limited to a days-to-expiry window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use oi_core::types::{InstrumentInfo, InstrumentMaster, OptionKind};

/// Which side of the book is expected to unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Shorts buying back calls: ATM and higher strikes
    ShortCovering,
    /// Longs selling puts: ATM and lower strikes
    LongUnwinding,
}

impl MovementType {
    pub fn option_kind(&self) -> OptionKind {
        match self {
            MovementType::ShortCovering => OptionKind::Call,
            MovementType::LongUnwinding => OptionKind::Put,
        }
    }
}

/// Acceptable days to expiry, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DteWindow {
    pub min: i64,
    pub max: i64,
}

impl Default for DteWindow {
    fn default() -> Self {
        Self { min: 1, max: 4 }
    }
}

impl DteWindow {
    pub fn contains(&self, dte: i64) -> bool {
        (self.min..=self.max).contains(&dte)
    }
}

/// Calendar days from `today` until `expiry`.
pub fn days_to_expiry(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// The strike nearest `spot` plus the next `max_strikes - 1` strikes away
/// from the money.
///
/// Calls step upward from the ATM strike, puts downward. Strikes are
/// sorted and deduplicated first; ties for ATM go to the lower strike.
pub fn select_strikes(
    spot: f64,
    available: &[f64],
    movement: MovementType,
    max_strikes: usize,
) -> Vec<f64> {
    let mut strikes: Vec<f64> = available.iter().copied().filter(|s| s.is_finite()).collect();
    strikes.sort_by(f64::total_cmp);
    strikes.dedup();

    let Some(atm) = strikes
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - spot).abs().total_cmp(&(b.1 - spot).abs()))
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };

    match movement {
        MovementType::ShortCovering => strikes.iter().skip(atm).take(max_strikes).copied().collect(),
        MovementType::LongUnwinding => strikes[..=atm].iter().rev().take(max_strikes).copied().collect(),
    }
}

/// Picks option contracts for one underlying from the instrument master.
#[derive(Debug, Clone)]
pub struct StrikeSelector {
    pub underlying: String,
    pub movement: MovementType,
    pub max_strikes: usize,
    pub dte: DteWindow,
}

impl StrikeSelector {
    pub fn new(underlying: impl Into<String>, movement: MovementType) -> Self {
        Self {
            underlying: underlying.into(),
            movement,
            max_strikes: 3,
            dte: DteWindow::default(),
        }
    }

    pub fn with_max_strikes(mut self, max_strikes: usize) -> Self {
        self.max_strikes = max_strikes;
        self
    }

    pub fn with_dte(mut self, dte: DteWindow) -> Self {
        self.dte = dte;
        self
    }

    /// Nearest expiry inside the DTE window on or after `today`.
    pub fn expiry(&self, master: &InstrumentMaster, today: NaiveDate) -> Option<NaiveDate> {
        master
            .options(&self.underlying, self.movement.option_kind())
            .filter_map(|e| e.expiry)
            .filter(|expiry| self.dte.contains(days_to_expiry(*expiry, today)))
            .min()
    }

    /// Contracts for the selected strikes at the nearest eligible expiry,
    /// ordered from the money outward. Empty when no expiry qualifies.
    pub fn select(
        &self,
        master: &InstrumentMaster,
        spot: f64,
        today: NaiveDate,
    ) -> Vec<InstrumentInfo> {
        let Some(expiry) = self.expiry(master, today) else {
            return Vec::new();
        };
        let chain: Vec<&InstrumentInfo> = master
            .options(&self.underlying, self.movement.option_kind())
            .filter(|e| e.expiry == Some(expiry))
            .collect();
        let strikes: Vec<f64> = chain.iter().map(|e| e.strike).collect();

        select_strikes(spot, &strikes, self.movement, self.max_strikes)
            .into_iter()
            .filter_map(|strike| chain.iter().find(|e| e.strike == strike).map(|e| (*e).clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRIKES: [f64; 7] = [23700.0, 23800.0, 23900.0, 24000.0, 24100.0, 24200.0, 24300.0];

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn chain(expiry: NaiveDate, token_base: u64) -> Vec<InstrumentInfo> {
        let mut entries = Vec::new();
        for (i, strike) in STRIKES.iter().enumerate() {
            for kind in ["CE", "PE"] {
                entries.push(InstrumentInfo {
                    instrument_token: token_base + i as u64 * 2 + u64::from(kind == "PE"),
                    symbol: format!("NIFTY{}{}{}", expiry.format("%y%m%d"), strike, kind),
                    name: "NIFTY".to_string(),
                    exchange: "NFO".to_string(),
                    expiry: Some(expiry),
                    strike: *strike,
                    lot_size: 25,
                    instrument_type: kind.to_string(),
                });
            }
        }
        entries
    }

    #[test]
    fn test_calls_step_up_from_atm() {
        let picked = select_strikes(24030.0, &STRIKES, MovementType::ShortCovering, 3);
        assert_eq!(picked, vec![24000.0, 24100.0, 24200.0]);
    }

    #[test]
    fn test_puts_step_down_from_atm() {
        let picked = select_strikes(24030.0, &STRIKES, MovementType::LongUnwinding, 3);
        assert_eq!(picked, vec![24000.0, 23900.0, 23800.0]);
    }

    #[test]
    fn test_selection_stops_at_chain_edge() {
        let picked = select_strikes(24400.0, &STRIKES, MovementType::ShortCovering, 3);
        assert_eq!(picked, vec![24300.0]);
        assert!(select_strikes(24000.0, &[], MovementType::ShortCovering, 3).is_empty());
    }

    #[test]
    fn test_unsorted_input_is_handled() {
        let shuffled = [24200.0, 23800.0, 24000.0, 24000.0, 24100.0];
        let picked = select_strikes(24010.0, &shuffled, MovementType::ShortCovering, 2);
        assert_eq!(picked, vec![24000.0, 24100.0]);
    }

    #[test]
    fn test_dte_window() {
        let window = DteWindow::default();
        assert_eq!(days_to_expiry(date(4), date(2)), 2);
        assert!(window.contains(days_to_expiry(date(4), date(2))));
        assert!(!window.contains(days_to_expiry(date(4), date(4))));
        assert!(!window.contains(days_to_expiry(date(11), date(4))));
    }

    #[test]
    fn test_selector_uses_nearest_eligible_expiry() {
        let mut entries = chain(date(4), 100);
        entries.extend(chain(date(8), 200));
        let master = InstrumentMaster::new(entries);
        let selector = StrikeSelector::new("NIFTY", MovementType::ShortCovering);

        // Expiry day itself is excluded, so the next week's series is used.
        let picked = selector.select(&master, 24030.0, date(4));
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|e| e.expiry == Some(date(8))));
        assert!(picked.iter().all(|e| e.instrument_type == "CE"));
        assert_eq!(picked[0].strike, 24000.0);

        let puts = StrikeSelector::new("NIFTY", MovementType::LongUnwinding)
            .with_max_strikes(2)
            .select(&master, 24030.0, date(2));
        assert_eq!(puts.iter().map(|e| e.strike).collect::<Vec<_>>(), vec![24000.0, 23900.0]);
        assert!(puts.iter().all(|e| e.expiry == Some(date(4))));
    }

    #[test]
    fn test_selector_empty_outside_window() {
        let master = InstrumentMaster::new(chain(date(30), 100));
        let selector = StrikeSelector::new("NIFTY", MovementType::ShortCovering);
        assert!(selector.select(&master, 24000.0, date(2)).is_empty());
    }
}
