//! Lecture times and calendar weeks.
//!
//! Lecture times travel as `"H:MM AM to H:MM PM"` but are held as minutes
//! since midnight, so sorting, conflict and completeness checks never look at
//! text.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::openapi::schema::{ObjectBuilder, SchemaType};
use utoipa::openapi::{RefOr, Schema};

lazy_static! {
    static ref CLOCK_TIME: Regex =
        Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*([AaPp][Mm])\s*$").expect("valid clock regex");
}

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("'{0}' is not a time of the form H:MM AM/PM")]
    Clock(String),
    #[error("'{0}' is not a time range of the form H:MM AM to H:MM PM")]
    Range(String),
    #[error("lecture must end after it starts")]
    Inverted,
}

/// Time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_minutes(minutes: u16) -> Option<ClockTime> {
        (minutes < MINUTES_PER_DAY).then_some(ClockTime(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<ClockTime> {
        (hour < 24 && minute < 60).then(|| ClockTime(hour * 60 + minute))
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimeError::Clock(s.to_string());
        let caps = CLOCK_TIME.captures(s).ok_or_else(bad)?;

        let hour: u16 = caps[1].parse().map_err(|_| bad())?;
        let minute: u16 = caps[2].parse().map_err(|_| bad())?;
        if !(1..=12).contains(&hour) || minute > 59 {
            return Err(bad());
        }

        let pm = caps[3].eq_ignore_ascii_case("pm");
        let hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };

        ClockTime::from_hm(hour, minute).ok_or_else(bad)
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (hour, minute) = (self.0 / 60, self.0 % 60);
        let meridiem = if hour < 12 { "AM" } else { "PM" };
        let hour = match hour % 12 {
            0 => 12,
            h => h,
        };
        write!(f, "{}:{:02} {}", hour, minute, meridiem)
    }
}

/// Start and end of a lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeRange {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<TimeRange, TimeError> {
        if end <= start {
            return Err(TimeError::Inverted);
        }
        Ok(TimeRange { start, end })
    }
}

impl FromStr for TimeRange {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(" to ")
            .ok_or_else(|| TimeError::Range(s.to_string()))?;
        TimeRange::new(start.parse()?, end.parse()?)
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl From<TimeRange> for bson::Bson {
    fn from(range: TimeRange) -> Self {
        bson::Bson::String(range.to_string())
    }
}

impl<'s> utoipa::ToSchema<'s> for TimeRange {
    fn schema() -> (&'s str, RefOr<Schema>) {
        (
            "TimeRange",
            ObjectBuilder::new()
                .schema_type(SchemaType::String)
                .example(Some("9:00 AM to 10:30 AM".into()))
                .into(),
        )
    }
}

/// Sunday and Saturday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = date.weekday().num_days_from_sunday() as i64;
    let start = date - Duration::days(offset);
    (start, start + Duration::days(6))
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, crate::resp::ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        crate::resp::error::problems::invalid_field(field, "Expected a date as YYYY-MM-DD.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(s: &str) -> u16 {
        s.parse::<ClockTime>().unwrap().minutes()
    }

    #[test]
    fn meridiem_edges() {
        assert_eq!(clock("12:00 AM"), 0);
        assert_eq!(clock("12:30 AM"), 30);
        assert_eq!(clock("12:00 PM"), 12 * 60);
        assert_eq!(clock("1:15 PM"), 13 * 60 + 15);
        assert_eq!(clock("9:05 am"), 9 * 60 + 5);
        assert_eq!(clock(" 11:59 PM "), 23 * 60 + 59);
    }

    #[test]
    fn malformed_clock_times_are_rejected() {
        for bad in ["13:00 PM", "0:30 AM", "9:60 AM", "9 AM", "9:00", "nine o'clock"] {
            assert!(bad.parse::<ClockTime>().is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn ranges_render_canonically() {
        let range: TimeRange = "9:00 am to 10:30 pm".parse().unwrap();
        assert_eq!(range.to_string(), "9:00 AM to 10:30 PM");

        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"9:00 AM to 10:30 PM\"");
        assert_eq!(serde_json::from_str::<TimeRange>(&json).unwrap(), range);
    }

    #[test]
    fn ranges_must_move_forward() {
        assert_eq!(
            "10:00 AM to 9:00 AM".parse::<TimeRange>(),
            Err(TimeError::Inverted)
        );
        assert!("9:00 AM - 10:00 AM".parse::<TimeRange>().is_err());
    }

    #[test]
    fn week_starts_on_sunday_and_contains_the_date() {
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for _ in 0..21 {
            let (start, end) = week_bounds(date);
            assert_eq!(start.weekday(), Weekday::Sun);
            assert!(start <= date && date <= end);
            assert_eq!(end - start, Duration::days(6));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn weekday_names() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(weekday_name(monday), "Monday");
        assert_eq!(weekday_name(week_bounds(monday).0), "Sunday");
    }
}
