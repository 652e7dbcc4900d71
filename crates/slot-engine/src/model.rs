//! Availability data model.
//!
//! These are the shapes persistence hands to the engine: half-hour aligned
//! wall-clock times, half-open selections, a fixed seven-day week, and
//! date-keyed overrides. Validation lives here, at the boundary; the codec
//! and projectors assume well-formed values.

use std::ops::{Index, IndexMut};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::day::DayKey;
use crate::error::{Result, ScheduleError};

/// Wall-clock time on a 30-minute grid, with no date or zone attached.
///
/// `24:00` is only meaningful as the exclusive end of a selection that runs
/// to the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Create a validated time: hour 0-23, minute 0 or 30.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        let time = Self { hour, minute };
        if hour > 23 || !time.minute_is_aligned() {
            return Err(ScheduleError::InvalidTime(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(time)
    }

    /// `24:00`, the exclusive end of a full day.
    pub const fn end_of_day() -> Self {
        Self { hour: 24, minute: 0 }
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.hour as u32 * 60 + self.minute as u32
    }

    fn minute_is_aligned(&self) -> bool {
        self.minute == 0 || self.minute == 30
    }

    fn validate_as_end(&self) -> Result<()> {
        if *self == Self::end_of_day() {
            return Ok(());
        }
        Self::new(self.hour, self.minute).map(|_| ())
    }
}

/// Half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSelection {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeSelection {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self> {
        let selection = Self { start, end };
        selection.validate()?;
        Ok(selection)
    }

    /// Check both endpoints are aligned and `start < end`.
    pub fn validate(&self) -> Result<()> {
        TimeOfDay::new(self.start.hour, self.start.minute)?;
        self.end.validate_as_end()?;
        if self.start >= self.end {
            return Err(ScheduleError::InvalidSelection(format!(
                "{:02}:{:02}-{:02}:{:02} does not end after it starts",
                self.start.hour, self.start.minute, self.end.hour, self.end.minute
            )));
        }
        Ok(())
    }

    /// Whether `[minute, minute + 30)` lies entirely inside this selection.
    pub fn contains_slot_at(&self, minute: u32) -> bool {
        minute >= self.start.minutes() && minute + 30 <= self.end.minutes()
    }
}

/// Recurring availability for each of the seven weekdays, in one reference
/// timezone.
///
/// Serialized as an object with exactly the seven lowercase day names; a
/// missing key deserializes to an empty day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WeekRepr", into = "WeekRepr")]
pub struct WeeklyAvailability {
    days: [Vec<TimeSelection>; 7],
}

impl WeeklyAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, day: DayKey) -> &[TimeSelection] {
        &self.days[day.index()]
    }

    pub fn set(&mut self, day: DayKey, selections: Vec<TimeSelection>) {
        self.days[day.index()] = selections;
    }

    /// Builder form of [`WeeklyAvailability::set`].
    pub fn with_day(mut self, day: DayKey, selections: Vec<TimeSelection>) -> Self {
        self.set(day, selections);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayKey, &[TimeSelection])> {
        DayKey::ALL.into_iter().map(move |day| (day, self.get(day)))
    }

    /// True when no day has any selection.
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }

    pub fn validate(&self) -> Result<()> {
        self.days.iter().flatten().try_for_each(TimeSelection::validate)
    }
}

impl Index<DayKey> for WeeklyAvailability {
    type Output = Vec<TimeSelection>;

    fn index(&self, day: DayKey) -> &Self::Output {
        &self.days[day.index()]
    }
}

impl IndexMut<DayKey> for WeeklyAvailability {
    fn index_mut(&mut self, day: DayKey) -> &mut Self::Output {
        &mut self.days[day.index()]
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct WeekRepr {
    #[serde(default)]
    monday: Vec<TimeSelection>,
    #[serde(default)]
    tuesday: Vec<TimeSelection>,
    #[serde(default)]
    wednesday: Vec<TimeSelection>,
    #[serde(default)]
    thursday: Vec<TimeSelection>,
    #[serde(default)]
    friday: Vec<TimeSelection>,
    #[serde(default)]
    saturday: Vec<TimeSelection>,
    #[serde(default)]
    sunday: Vec<TimeSelection>,
}

impl From<WeekRepr> for WeeklyAvailability {
    fn from(r: WeekRepr) -> Self {
        Self {
            days: [
                r.monday,
                r.tuesday,
                r.wednesday,
                r.thursday,
                r.friday,
                r.saturday,
                r.sunday,
            ],
        }
    }
}

impl From<WeeklyAvailability> for WeekRepr {
    fn from(w: WeeklyAvailability) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = w.days;
        Self {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }
}

/// Whether an override removes or adds availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Block,
    Unblock,
}

/// A one-date exception layered over the recurring week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    pub availability: Vec<TimeSelection>,
}

impl Override {
    pub fn block(date: NaiveDate, availability: Vec<TimeSelection>) -> Self {
        Self {
            date,
            kind: OverrideKind::Block,
            availability,
        }
    }

    pub fn unblock(date: NaiveDate, availability: Vec<TimeSelection>) -> Self {
        Self {
            date,
            kind: OverrideKind::Unblock,
            availability,
        }
    }
}

/// A room's canonical display window, in the room's own timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomWindow {
    pub start_hour: u8,
    pub end_hour: u8,
    pub timezone: String,
}

impl RoomWindow {
    pub fn validate(&self) -> Result<()> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(ScheduleError::InvalidWindow(format!(
                "{}-{} is not an ascending hour range within a day",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }
}

/// Everything the engine needs to know about one person's availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSchedule {
    pub timezone: String,
    pub weekly_availability: WeeklyAvailability,
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl UserSchedule {
    pub fn new(timezone: impl Into<String>, weekly_availability: WeeklyAvailability) -> Self {
        Self {
            timezone: timezone.into(),
            weekly_availability,
            overrides: Vec::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<Override>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.weekly_availability.validate()?;
        self.overrides
            .iter()
            .flat_map(|o| o.availability.iter())
            .try_for_each(TimeSelection::validate)
    }
}

/// Whole-hour range a room displays by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRange {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Default for DisplayRange {
    fn default() -> Self {
        Self {
            start_hour: 10,
            end_hour: 23,
        }
    }
}

/// Smallest whole-hour range covering every selection of a room's default
/// week. An empty week falls back to [`DisplayRange::default`].
pub fn time_range(default_availability: &WeeklyAvailability) -> DisplayRange {
    if default_availability.is_empty() {
        return DisplayRange::default();
    }
    let mut min_hour = 23;
    let mut max_hour = 0;
    for (_, selections) in default_availability.iter() {
        for sel in selections {
            min_hour = min_hour.min(sel.start.hour);
            let end_hour = if sel.end.minute > 0 {
                sel.end.hour + 1
            } else {
                sel.end.hour
            };
            max_hour = max_hour.max(end_hour);
        }
    }
    if min_hour > max_hour {
        return DisplayRange::default();
    }
    DisplayRange {
        start_hour: min_hour,
        end_hour: max_hour,
    }
}
