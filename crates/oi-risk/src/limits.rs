//! Per-session trade counters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Entries confirmed in the current session, against a daily ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCounters {
    pub trades_today: u32,
    pub max_daily_trades: u32,
    /// BUY signals turned away by the cap this session
    pub suppressed_today: u32,
    session: Option<NaiveDate>,
}

impl RiskCounters {
    pub fn new(max_daily_trades: u32) -> Self {
        Self {
            trades_today: 0,
            max_daily_trades,
            suppressed_today: 0,
            session: None,
        }
    }

    pub fn session(&self) -> Option<NaiveDate> {
        self.session
    }

    /// Start a new session if `date` differs from the current one.
    ///
    /// Returns true when the counters were reset.
    pub fn roll_session(&mut self, date: NaiveDate) -> bool {
        if self.session == Some(date) {
            return false;
        }
        let rolled = self.session.is_some();
        self.session = Some(date);
        self.trades_today = 0;
        self.suppressed_today = 0;
        rolled
    }

    pub fn can_enter(&self) -> bool {
        self.trades_today < self.max_daily_trades
    }

    pub fn record_entry(&mut self) {
        self.trades_today = self.trades_today.saturating_add(1);
    }

    pub fn record_suppressed(&mut self) {
        self.suppressed_today += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_cap() {
        let mut counters = RiskCounters::new(2);
        counters.roll_session(day(1));
        assert!(counters.can_enter());
        counters.record_entry();
        counters.record_entry();
        assert!(!counters.can_enter());
    }

    #[test]
    fn test_roll_session_resets() {
        let mut counters = RiskCounters::new(1);
        assert!(!counters.roll_session(day(1)));
        counters.record_entry();
        counters.record_suppressed();

        assert!(!counters.roll_session(day(1)));
        assert!(!counters.can_enter());

        assert!(counters.roll_session(day(2)));
        assert_eq!(counters.trades_today, 0);
        assert_eq!(counters.suppressed_today, 0);
        assert!(counters.can_enter());
    }

    #[test]
    fn test_zero_cap_never_enters() {
        let counters = RiskCounters::new(0);
        assert!(!counters.can_enter());
    }
}
