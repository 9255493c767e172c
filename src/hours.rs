//! CME Equity Index Futures Trading Hours
//!
//! Classifies timestamps against the CME equity-index session (ES/MES).
//! All rules are expressed in exchange time (America/Chicago) so DST
//! transitions are handled correctly.
//!
//! Standard trading day:
//! - Daily close: 4:00 PM CT
//! - Reopens: 5:00 PM CT
//! - Flatten window: last 20 minutes before close
//! - Saturday closed all day, Sunday closed until 5:00 PM CT
//! - Early closes on holidays come from an optional per-date calendar

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::America::Chicago;
use std::collections::HashMap;

/// Minutes before the daily close during which positions are force-closed
pub const FLATTEN_MINUTES_BEFORE_CLOSE: i64 = 20;

/// Market status for a given timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    /// Regular session, entries and exits allowed
    Open,
    /// Last minutes before the close: exits only, open positions are flattened
    FlattenWindow,
    /// Market closed: exits only, no new entries
    Closed,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "OPEN"),
            MarketStatus::FlattenWindow => write!(f, "FLATTEN_WINDOW"),
            MarketStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// CME equity-index trading-hours oracle
///
/// Pure classifier over timestamps; holds only the early-close calendar.
#[derive(Debug, Clone, Default)]
pub struct CmeTradingHours {
    /// Date -> (hour, minute) of that day's early close, in Chicago time
    early_close_calendar: HashMap<NaiveDate, (u32, u32)>,
}

impl CmeTradingHours {
    pub fn new(early_close_calendar: HashMap<NaiveDate, (u32, u32)>) -> Self {
        Self {
            early_close_calendar,
        }
    }

    fn daily_close() -> NaiveTime {
        NaiveTime::from_hms_opt(16, 0, 0).expect("valid close time")
    }

    fn daily_reopen() -> NaiveTime {
        NaiveTime::from_hms_opt(17, 0, 0).expect("valid reopen time")
    }

    /// Close time for a specific date, honoring the early-close calendar
    fn close_time_for(&self, date: NaiveDate) -> NaiveTime {
        if let Some(&(hour, minute)) = self.early_close_calendar.get(&date) {
            if let Some(t) = NaiveTime::from_hms_opt(hour, minute, 0) {
                return t;
            }
        }
        Self::daily_close()
    }

    /// Start of the flatten window for a specific date
    fn flatten_time_for(&self, date: NaiveDate) -> NaiveTime {
        let close = date.and_time(self.close_time_for(date));
        (close - Duration::minutes(FLATTEN_MINUTES_BEFORE_CLOSE)).time()
    }

    /// Classify an exchange-local (Chicago wall clock) timestamp
    pub fn status_local(&self, dt: NaiveDateTime) -> (MarketStatus, String) {
        let time = dt.time();
        let weekday = dt.weekday();
        let reopen = Self::daily_reopen();

        if weekday == Weekday::Sat {
            return (MarketStatus::Closed, "Market closed (Saturday)".to_string());
        }

        if weekday == Weekday::Sun && time < reopen {
            return (
                MarketStatus::Closed,
                format!("Market closed (Sunday, opens at {} CT)", reopen),
            );
        }

        let close = self.close_time_for(dt.date());
        let flatten = self.flatten_time_for(dt.date());

        if close <= time && time < reopen {
            return (
                MarketStatus::Closed,
                format!("Market closed ({} - {} CT)", close, reopen),
            );
        }

        if flatten <= time && time < close {
            return (
                MarketStatus::FlattenWindow,
                format!("Flatten window ({} - {} CT)", flatten, close),
            );
        }

        (
            MarketStatus::Open,
            format!("Trading allowed ({} CT)", dt.format("%A %H:%M:%S")),
        )
    }

    /// Classify a UTC timestamp, converting to Chicago time first
    pub fn status_utc(&self, dt: DateTime<Utc>) -> (MarketStatus, String) {
        self.status_local(dt.with_timezone(&Chicago).naive_local())
    }

    /// Whether the market is fully closed at the given exchange-local time
    pub fn is_closed(&self, dt: NaiveDateTime) -> bool {
        self.status_local(dt).0 == MarketStatus::Closed
    }

    /// Whether open positions should be flattened at the given exchange-local time
    pub fn should_flatten(&self, dt: NaiveDateTime) -> bool {
        self.status_local(dt).0 == MarketStatus::FlattenWindow
    }

    /// Whether new entries are allowed at the given exchange-local time
    pub fn is_trading_allowed(&self, dt: NaiveDateTime) -> bool {
        self.status_local(dt).0 == MarketStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    // 2025-01-07 is a Tuesday
    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()
    }

    #[test]
    fn weekday_session_classification() {
        let hours = CmeTradingHours::default();

        assert_eq!(hours.status_local(at(tuesday(), 10, 0)).0, MarketStatus::Open);
        assert_eq!(hours.status_local(at(tuesday(), 15, 39)).0, MarketStatus::Open);
        assert_eq!(
            hours.status_local(at(tuesday(), 15, 40)).0,
            MarketStatus::FlattenWindow
        );
        assert_eq!(
            hours.status_local(at(tuesday(), 15, 59)).0,
            MarketStatus::FlattenWindow
        );
        assert_eq!(hours.status_local(at(tuesday(), 16, 0)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(tuesday(), 16, 59)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(tuesday(), 17, 0)).0, MarketStatus::Open);
        assert_eq!(hours.status_local(at(tuesday(), 23, 30)).0, MarketStatus::Open);
    }

    #[test]
    fn weekend_classification() {
        let hours = CmeTradingHours::default();
        let saturday = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();

        assert_eq!(hours.status_local(at(saturday, 10, 0)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(saturday, 18, 0)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(sunday, 16, 59)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(sunday, 17, 0)).0, MarketStatus::Open);
    }

    #[test]
    fn early_close_shifts_window() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 29).unwrap(); // day after Thanksgiving
        let mut calendar = HashMap::new();
        calendar.insert(date, (12, 15));
        let hours = CmeTradingHours::new(calendar);

        assert_eq!(hours.status_local(at(date, 11, 54)).0, MarketStatus::Open);
        assert_eq!(
            hours.status_local(at(date, 11, 55)).0,
            MarketStatus::FlattenWindow
        );
        assert_eq!(
            hours.status_local(at(date, 12, 0)).0,
            MarketStatus::FlattenWindow
        );
        assert_eq!(hours.status_local(at(date, 12, 15)).0, MarketStatus::Closed);
        assert_eq!(hours.status_local(at(date, 17, 0)).0, MarketStatus::Open);
    }

    #[test]
    fn utc_conversion_respects_dst() {
        let hours = CmeTradingHours::default();

        // January: Chicago is UTC-6, so 21:45 UTC = 15:45 CT (flatten window)
        let winter = Utc.with_ymd_and_hms(2025, 1, 7, 21, 45, 0).unwrap();
        assert_eq!(hours.status_utc(winter).0, MarketStatus::FlattenWindow);

        // July: Chicago is UTC-5, so 20:45 UTC = 15:45 CT (flatten window)
        let summer = Utc.with_ymd_and_hms(2025, 7, 8, 20, 45, 0).unwrap();
        assert_eq!(hours.status_utc(summer).0, MarketStatus::FlattenWindow);

        // 20:45 UTC in January is only 14:45 CT - still open
        let winter_open = Utc.with_ymd_and_hms(2025, 1, 7, 20, 45, 0).unwrap();
        assert_eq!(hours.status_utc(winter_open).0, MarketStatus::Open);
    }

    #[test]
    fn convenience_predicates() {
        let hours = CmeTradingHours::default();
        assert!(hours.is_trading_allowed(at(tuesday(), 10, 0)));
        assert!(hours.should_flatten(at(tuesday(), 15, 45)));
        assert!(hours.is_closed(at(tuesday(), 16, 30)));
    }
}
