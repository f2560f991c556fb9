//! Exchange trading hours.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Daily trading window on weekdays, in exchange-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset_minutes: i32,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            utc_offset_minutes: 330,
        }
    }
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, utc_offset_minutes: i32) -> Self {
        Self {
            start,
            end,
            utc_offset_minutes,
        }
    }

    fn offset(&self) -> Duration {
        Duration::minutes(self.utc_offset_minutes as i64)
    }

    /// Exchange-local wall clock at `at`.
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc() + self.offset()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - self.offset()).and_utc()
    }

    pub fn session_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date()
    }

    pub fn is_trading_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// True between `start` (inclusive) and `end` (exclusive) on a weekday.
    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = self.local(at);
        Self::is_trading_day(local.date()) && local.time() >= self.start && local.time() < self.end
    }

    /// True once today's session has ended.
    pub fn is_past_close(&self, at: DateTime<Utc>) -> bool {
        self.local(at).time() >= self.end
    }

    /// Start of the next session at or after `at`. Returns `at`'s own
    /// session start when that is still ahead.
    pub fn next_open(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local(at);
        let mut date = local.date();
        if !Self::is_trading_day(date) || local.time() >= self.start {
            date = date.succ_opt().unwrap_or(date);
        }
        while !Self::is_trading_day(date) {
            date = date.succ_opt().unwrap_or(date);
        }
        self.to_utc(date.and_time(self.start))
    }

    /// Close of the session containing `at`.
    pub fn close_of(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.to_utc(self.local(at).date().and_time(self.end))
    }

    /// First instant after `at` on the grid `start + lag + k * interval`
    /// of `at`'s local day.
    ///
    /// Before the session it returns the first grid point of the day.
    pub fn next_aligned(&self, at: DateTime<Utc>, interval: Duration, lag: Duration) -> DateTime<Utc> {
        let local = self.local(at);
        let anchor = local.date().and_time(self.start) + lag;
        if local < anchor || interval <= Duration::zero() {
            return self.to_utc(anchor.max(local));
        }
        let elapsed = (local - anchor).num_milliseconds();
        let step = interval.num_milliseconds();
        let periods = elapsed / step + 1;
        self.to_utc(anchor + Duration::milliseconds(periods * step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Convert an IST wall clock to UTC.
    fn ist(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap() - Duration::minutes(330)
    }

    #[test]
    fn test_open_hours() {
        let window = SessionWindow::default();
        // 2024-07-01 is a Monday
        assert!(!window.is_open(ist(2024, 7, 1, 9, 14, 59)));
        assert!(window.is_open(ist(2024, 7, 1, 9, 15, 0)));
        assert!(window.is_open(ist(2024, 7, 1, 15, 29, 59)));
        assert!(!window.is_open(ist(2024, 7, 1, 15, 30, 0)));
        assert!(!window.is_open(ist(2024, 7, 6, 11, 0, 0)));
    }

    #[test]
    fn test_session_date_uses_offset() {
        let window = SessionWindow::default();
        // 20:00 UTC on the 1st is 01:30 IST on the 2nd
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 20, 0, 0).unwrap();
        assert_eq!(window.session_date(at), NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
    }

    #[test]
    fn test_next_open_skips_weekend() {
        let window = SessionWindow::default();
        assert_eq!(window.next_open(ist(2024, 7, 1, 8, 0, 0)), ist(2024, 7, 1, 9, 15, 0));
        assert_eq!(window.next_open(ist(2024, 7, 5, 16, 0, 0)), ist(2024, 7, 8, 9, 15, 0));
        assert_eq!(window.next_open(ist(2024, 7, 6, 8, 0, 0)), ist(2024, 7, 8, 9, 15, 0));
    }

    #[test]
    fn test_next_aligned_grid() {
        let window = SessionWindow::default();
        let interval = Duration::seconds(180);
        let lag = Duration::seconds(13);

        assert_eq!(
            window.next_aligned(ist(2024, 7, 1, 9, 0, 0), interval, lag),
            ist(2024, 7, 1, 9, 15, 13)
        );
        assert_eq!(
            window.next_aligned(ist(2024, 7, 1, 9, 15, 13), interval, lag),
            ist(2024, 7, 1, 9, 18, 13)
        );
        assert_eq!(
            window.next_aligned(ist(2024, 7, 1, 10, 1, 0), interval, lag),
            ist(2024, 7, 1, 10, 3, 13)
        );
    }

    #[test]
    fn test_close_of() {
        let window = SessionWindow::default();
        assert_eq!(window.close_of(ist(2024, 7, 1, 10, 0, 0)), ist(2024, 7, 1, 15, 30, 0));
        assert!(window.is_past_close(ist(2024, 7, 1, 15, 30, 0)));
    }
}
