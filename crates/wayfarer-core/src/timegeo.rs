//! Pure time-of-day and geodesic helpers.
//!
//! All scheduling arithmetic goes through [`TimeOfDay`], a minutes-since-
//! midnight newtype. Adding past midnight is an error, never a silent wrap:
//! the planner rejects items that would cross into the next day.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use wayfarer_db::models::GeoPoint;

/// Errors from time-of-day parsing and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("invalid time of day {0:?}: expected zero-padded HH:MM")]
    InvalidFormat(String),

    #[error("time arithmetic crossed midnight: {time} + {minutes} min")]
    MidnightWrap { time: String, minutes: i64 },

    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// A local time of day in minutes since midnight (0..=1439).
///
/// The numeric ordering matches the lexicographic ordering of the
/// zero-padded `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    /// Last representable minute of the day, 23:59.
    pub const MAX: TimeOfDay = TimeOfDay(24 * 60 - 1);

    /// Construct from a minute count. Returns `None` past 23:59.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < 24 * 60).then_some(Self(minutes))
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Add minutes, failing if the result would cross midnight.
    pub fn checked_add(self, minutes: i64) -> Result<Self, TimeError> {
        let total = i64::from(self.0) + minutes;
        if (0..24 * 60).contains(&total) {
            Ok(Self(total as u16))
        } else {
            Err(TimeError::MidnightWrap {
                time: self.to_string(),
                minutes,
            })
        }
    }

    /// Minutes from `self` to `later` on the same day.
    ///
    /// Negative when `later` is earlier than `self`.
    pub fn minutes_until(self, later: TimeOfDay) -> i64 {
        i64::from(later.0) - i64::from(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimeError::InvalidFormat(s.to_owned());

        let (hh, mm) = s.split_once(':').ok_or_else(bad)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(bad());
        }
        let hours: u16 = hh.parse().map_err(|_| bad())?;
        let minutes: u16 = mm.parse().map_err(|_| bad())?;
        if hours >= 24 || minutes >= 60 {
            return Err(bad());
        }
        Ok(Self(hours * 60 + minutes))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// Parse a `YYYY-MM-DD` date string.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| TimeError::InvalidDate(s.to_owned()))
}

/// Lowercase weekday name (`sunday`..`saturday`) for a calendar date.
///
/// This is the key format used by POI weekly-hours tables.
pub fn weekday_key(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        for s in ["00:00", "09:05", "12:30", "23:59"] {
            let t: TimeOfDay = s.parse().unwrap();
            assert_eq!(t.to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_times() {
        for s in ["24:00", "9:05", "09:5", "09-05", "09:60", "", "xx:yy", "09:05:00"] {
            assert!(s.parse::<TimeOfDay>().is_err(), "expected {s:?} to fail");
        }
    }

    #[test]
    fn ordering_matches_lexicographic() {
        let a: TimeOfDay = "09:30".parse().unwrap();
        let b: TimeOfDay = "10:00".parse().unwrap();
        assert!(a < b);
        assert!("09:30" < "10:00");
    }

    #[test]
    fn checked_add_rejects_midnight_wrap() {
        let t: TimeOfDay = "23:30".parse().unwrap();
        assert_eq!(t.checked_add(29).unwrap().to_string(), "23:59");
        assert!(matches!(
            t.checked_add(30),
            Err(TimeError::MidnightWrap { .. })
        ));
        let early: TimeOfDay = "00:10".parse().unwrap();
        assert!(early.checked_add(-11).is_err());
    }

    #[test]
    fn duration_between_times() {
        let a: TimeOfDay = "10:15".parse().unwrap();
        let b: TimeOfDay = "12:15".parse().unwrap();
        assert_eq!(a.minutes_until(b), 120);
        assert_eq!(b.minutes_until(a), -120);
    }

    #[test]
    fn weekday_keys() {
        // 2025-03-01 is a Saturday.
        let d = parse_date("2025-03-01").unwrap();
        assert_eq!(weekday_key(d), "saturday");
        assert_eq!(weekday_key(d.succ_opt().unwrap()), "sunday");
    }

    #[test]
    fn haversine_known_distance() {
        // Bangkok Grand Palace to Wat Arun: roughly 1 km.
        let palace = GeoPoint::new(13.7500, 100.4913);
        let arun = GeoPoint::new(13.7437, 100.4889);
        let d = haversine_km(&palace, &arun);
        assert!(d > 0.5 && d < 1.2, "unexpected distance {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = GeoPoint::new(13.75, 100.5);
        assert!(haversine_km(&p, &p).abs() < 1e-9);
    }
}
