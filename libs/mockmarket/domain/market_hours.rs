//! NSE trading session
//!
//! The exchange runs a regular session 09:15-15:30 IST, Monday to Friday,
//! minus exchange holidays. IST has no daylight saving, so it is a fixed
//! +05:30 offset from UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use std::collections::BTreeSet;

/// Seconds east of UTC for India Standard Time
pub const IST_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Regular session definition
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSession {
    open: NaiveTime,
    close: NaiveTime,
    holidays: BTreeSet<NaiveDate>,
}

impl Default for MarketSession {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
            holidays: BTreeSet::new(),
        }
    }
}

impl MarketSession {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open,
            close,
            holidays: BTreeSet::new(),
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn open_time(&self) -> NaiveTime {
        self.open
    }

    pub fn close_time(&self) -> NaiveTime {
        self.close
    }

    /// Wall-clock time in IST
    pub fn to_ist(at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc() + Duration::seconds(IST_OFFSET_SECS)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Open at `open`, closed from `close` onwards
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local = Self::to_ist(at);
        if !self.is_trading_day(local.date()) {
            return false;
        }
        let time = local.time();
        time >= self.open && time < self.close
    }
}

/// Source of "is the market open right now"
pub trait MarketClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn session(&self) -> &MarketSession;

    fn is_market_open(&self) -> bool {
        self.session().is_open_at(self.now())
    }
}

/// Wall clock
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    session: MarketSession,
}

impl SystemClock {
    pub fn new(session: MarketSession) -> Self {
        Self { session }
    }
}

impl MarketClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn session(&self) -> &MarketSession {
        &self.session
    }
}

/// Frozen clock for tests and replays
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: DateTime<Utc>,
    session: MarketSession,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            session: MarketSession::default(),
        }
    }

    /// Clock frozen at an IST wall-clock time
    pub fn at_ist(date: NaiveDate, time: NaiveTime) -> Self {
        let utc = date.and_time(time) - Duration::seconds(IST_OFFSET_SECS);
        Self::new(utc.and_utc())
    }

    pub fn with_session(mut self, session: MarketSession) -> Self {
        self.session = session;
        self
    }
}

impl MarketClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }

    fn session(&self) -> &MarketSession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_weekday_session_bounds() {
        // 2026-03-04 is a Wednesday
        let wed = date(2026, 3, 4);
        assert!(!FixedClock::at_ist(wed, time(9, 14)).is_market_open());
        assert!(FixedClock::at_ist(wed, time(9, 15)).is_market_open());
        assert!(FixedClock::at_ist(wed, time(12, 0)).is_market_open());
        assert!(FixedClock::at_ist(wed, time(15, 29)).is_market_open());
        assert!(!FixedClock::at_ist(wed, time(15, 30)).is_market_open());
        assert!(!FixedClock::at_ist(wed, time(16, 0)).is_market_open());
    }

    #[test]
    fn test_weekend_is_closed() {
        // 2026-03-07 is a Saturday
        assert!(!FixedClock::at_ist(date(2026, 3, 7), time(11, 0)).is_market_open());
        assert!(!FixedClock::at_ist(date(2026, 3, 8), time(11, 0)).is_market_open());
    }

    #[test]
    fn test_holiday_is_closed() {
        let holiday = date(2026, 3, 4);
        let clock = FixedClock::at_ist(holiday, time(11, 0))
            .with_session(MarketSession::default().with_holidays([holiday]));
        assert!(!clock.is_market_open());
    }

    #[test]
    fn test_ist_conversion_crosses_midnight() {
        // 20:00 UTC Friday is 01:30 IST Saturday
        let friday_evening = date(2026, 3, 6).and_time(time(20, 0)).and_utc();
        let ist = MarketSession::to_ist(friday_evening);
        assert_eq!(ist.date(), date(2026, 3, 7));
        assert_eq!(ist.time(), NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }
}
