//! Weekday keys and the calendar helpers built on them.
//!
//! Recurring availability is indexed by [`DayKey`], a fixed seven-element
//! enumeration. "Previous" and "next" day are modulo-7 arithmetic on the
//! enumeration index, never string comparisons, so the day before Monday is
//! always Sunday regardless of locale.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// One of the seven recurring weekdays, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKey {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayKey {
    /// All day keys in storage order.
    pub const ALL: [DayKey; 7] = [
        DayKey::Monday,
        DayKey::Tuesday,
        DayKey::Wednesday,
        DayKey::Thursday,
        DayKey::Friday,
        DayKey::Saturday,
        DayKey::Sunday,
    ];

    /// Position in [`DayKey::ALL`] (Monday = 0).
    pub fn index(self) -> usize {
        self as usize
    }

    /// The day key at `index`, wrapping in both directions.
    pub fn from_index(index: i64) -> Self {
        Self::ALL[index.rem_euclid(7) as usize]
    }

    pub fn prev(self) -> Self {
        self.shift(-1)
    }

    pub fn next(self) -> Self {
        self.shift(1)
    }

    /// Move `days` forward (or backward when negative) around the week.
    pub fn shift(self, days: i64) -> Self {
        Self::from_index(self.index() as i64 + days)
    }

    /// The day key a calendar date falls on.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_weekday(date.weekday())
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Self::from_index(weekday.num_days_from_monday() as i64)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::Monday => "monday",
            DayKey::Tuesday => "tuesday",
            DayKey::Wednesday => "wednesday",
            DayKey::Thursday => "thursday",
            DayKey::Friday => "friday",
            DayKey::Saturday => "saturday",
            DayKey::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DayKey {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == lower)
            .ok_or_else(|| ScheduleError::InvalidDate(format!("unknown day key '{}'", s)))
    }
}

/// The Monday starting the ISO week that contains `date`.
pub fn monday_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Format a date as the `YYYY-MM-DD` key overrides are matched on.
pub fn format_date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` date key.
pub fn parse_date_key(s: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ScheduleError::InvalidDate(format!("'{}': {}", s, e)))
}
