//! Timezone offsets and wall-clock conversion between zones.
//!
//! Offsets come from the IANA rules compiled into `chrono-tz`, evaluated at
//! the specific instant asked about, so DST is always taken into account.
//! Nothing here reads the system clock; callers pass the reference date.
//!
//! # Functions
//!
//! - [`offset_ms`] — UTC offset of a zone at an instant
//! - [`convert_clock_time`] — Re-express a wall-clock time in another zone,
//!   tracking how many calendar days it moved
//! - [`OffsetCache`] — Owned memoizing wrapper for repeated lookups

use std::collections::HashMap;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{Result, ScheduleError};

/// A wall-clock time after conversion into a target zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedTime {
    pub hour: u8,
    pub minute: u8,
    /// Calendar days between the converted date and the reference date
    /// (-1, 0 or +1 for any real pair of zones).
    pub day_offset: i64,
}

/// Parse an IANA timezone string into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(format!("'{}'", s)))
}

/// The signed offset, in milliseconds, added to UTC to obtain the wall-clock
/// time of `timezone` at `instant`.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidTimezone`] if the zone name is unknown.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use slot_engine::offset::offset_ms;
///
/// let winter = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
/// assert_eq!(offset_ms(winter, "America/New_York").unwrap(), -5 * 3_600_000);
/// ```
pub fn offset_ms(instant: DateTime<Utc>, timezone: &str) -> Result<i64> {
    let tz = parse_timezone(timezone)?;
    Ok(offset_ms_in(instant, tz))
}

/// [`offset_ms`] for an already-parsed zone.
pub fn offset_ms_in(instant: DateTime<Utc>, tz: Tz) -> i64 {
    let offset_secs = tz
        .offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc();
    offset_secs as i64 * 1000
}

/// Convert `hour:minute` on `reference_date` in `from_tz` to the wall-clock
/// time in `to_tz` at the same instant.
///
/// The target offset is evaluated at the converted instant, not at the
/// reference date, so times near a DST change land on the right side of it.
/// Hours of 24 or more roll over onto following dates.
///
/// A wall-clock time that occurs twice (DST fall-back) resolves to the
/// earlier instant. One that never occurs (spring-forward gap) is read with
/// the offset in force before the gap, which moves it forward.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidTimezone`] if either zone is unknown.
pub fn convert_clock_time(
    hour: u8,
    minute: u8,
    reference_date: NaiveDate,
    from_tz: &str,
    to_tz: &str,
) -> Result<ConvertedTime> {
    let from = parse_timezone(from_tz)?;
    let to = parse_timezone(to_tz)?;
    Ok(convert_clock_time_in(hour, minute, reference_date, from, to))
}

/// [`convert_clock_time`] for already-parsed zones.
pub fn convert_clock_time_in(
    hour: u8,
    minute: u8,
    reference_date: NaiveDate,
    from: Tz,
    to: Tz,
) -> ConvertedTime {
    convert_with(hour, minute, reference_date, from, to, offset_ms_in)
}

/// Whether DST is in effect for `tz` at `instant`.
///
/// The zone's standard offset is taken as the smaller of its January and July
/// offsets that year, which holds in both hemispheres.
pub fn is_dst_active(instant: DateTime<Utc>, tz: Tz) -> bool {
    let year = instant.year();
    let probe = |month| {
        Utc.with_ymd_and_hms(year, month, 1, 12, 0, 0)
            .single()
            .map(|dt| offset_ms_in(dt, tz))
    };
    let current = offset_ms_in(instant, tz);
    match (probe(1), probe(7)) {
        (Some(jan), Some(jul)) => current > jan.min(jul),
        _ => false,
    }
}

/// Format an offset in milliseconds as `+HH:MM` / `-HH:MM`.
pub fn format_utc_offset(offset_ms: i64) -> String {
    let sign = if offset_ms >= 0 { "+" } else { "-" };
    let abs_mins = offset_ms.unsigned_abs() / 60_000;
    let hours = abs_mins / 60;
    let minutes = abs_mins % 60;
    format!("{sign}{hours:02}:{minutes:02}")
}

// ── OffsetCache ─────────────────────────────────────────────────────────────

/// Memoizes offset lookups by `(instant truncated to the minute, zone)`.
///
/// Owned by whoever runs a batch of conversions; never shared globally.
#[derive(Debug, Default)]
pub struct OffsetCache {
    entries: HashMap<(i64, Tz), i64>,
}

impl OffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached [`offset_ms_in`].
    pub fn offset_ms(&mut self, instant: DateTime<Utc>, tz: Tz) -> i64 {
        let key = (instant.timestamp().div_euclid(60), tz);
        *self
            .entries
            .entry(key)
            .or_insert_with(|| offset_ms_in(instant, tz))
    }

    /// [`convert_clock_time_in`] with target offsets served from the cache.
    pub fn convert(
        &mut self,
        hour: u8,
        minute: u8,
        reference_date: NaiveDate,
        from: Tz,
        to: Tz,
    ) -> ConvertedTime {
        convert_with(hour, minute, reference_date, from, to, |instant, tz| {
            self.offset_ms(instant, tz)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn convert_with<F>(
    hour: u8,
    minute: u8,
    reference_date: NaiveDate,
    from: Tz,
    to: Tz,
    mut offset_at: F,
) -> ConvertedTime
where
    F: FnMut(DateTime<Utc>, Tz) -> i64,
{
    let wall = reference_date.and_time(NaiveTime::MIN)
        + Duration::minutes(hour as i64 * 60 + minute as i64);
    let instant = local_to_utc(wall, from, &mut offset_at);
    let local = instant.naive_utc() + Duration::milliseconds(offset_at(instant, to));

    ConvertedTime {
        hour: local.hour() as u8,
        minute: local.minute() as u8,
        day_offset: (local.date() - reference_date).num_days(),
    }
}

/// Resolve a wall-clock time in `tz` to a UTC instant.
fn local_to_utc<F>(wall: NaiveDateTime, tz: Tz, offset_at: &mut F) -> DateTime<Utc>
where
    F: FnMut(DateTime<Utc>, Tz) -> i64,
{
    match tz.from_local_datetime(&wall) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Zones change offset at most once a day, so a day earlier is
            // before the gap.
            let before = offset_at((wall - Duration::days(1)).and_utc(), tz);
            tracing::trace!(%wall, tz = tz.name(), "wall-clock time falls in a DST gap");
            (wall - Duration::milliseconds(before)).and_utc()
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
