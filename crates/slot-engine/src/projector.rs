//! Projection of one person's availability onto a viewer's window, and back.
//!
//! Availability is stored in the owner's zone, keyed by weekday. A viewer
//! sees it through a [`LocalTimeWindow`] for one day key. Going forward, every
//! viewer slot is traced back to the owner's wall clock and sampled from the
//! owner's override-resolved day. Going back, every edited viewer slot is
//! traced the same way and written into a per-day owner grid, which the codec
//! turns into selections for persistence.
//!
//! Slots in the top segment of a wrapping window are referenced to the day
//! before `day_key` (and the date before `reference_date`) prior to applying
//! the conversion's day offset.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::day::DayKey;
use crate::error::Result;
use crate::grid::{slot_of, to_selections, Grid, DAY_SLOTS};
use crate::model::{TimeOfDay, TimeSelection, UserSchedule};
use crate::offset::{parse_timezone, ConvertedTime, OffsetCache};
use crate::overrides::{resolve_day, resolve_day_selections};
use crate::window::LocalTimeWindow;

/// Selections to store for one owner weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySelections {
    pub day_key: DayKey,
    pub selections: Vec<TimeSelection>,
}

/// Where one viewer slot lands in the owner's calendar.
struct OwnerSlot {
    day: DayKey,
    date: NaiveDate,
    time: ConvertedTime,
}

impl OwnerSlot {
    fn minute_of_day(&self) -> u32 {
        self.time.hour as u32 * 60 + self.time.minute as u32
    }

    fn slot_index(&self) -> usize {
        slot_of(TimeOfDay {
            hour: self.time.hour,
            minute: self.time.minute,
        }) as usize
    }
}

/// Traces viewer slots of one window back to the owner's zone.
struct SlotMapper<'a> {
    window: &'a LocalTimeWindow,
    reference_date: NaiveDate,
    day_key: DayKey,
    viewer: Tz,
    owner: Tz,
    offsets: OffsetCache,
}

impl SlotMapper<'_> {
    fn owner_slot(&mut self, index: usize) -> OwnerSlot {
        let local = self.window.slot_time(index);
        let (ref_day, ref_date) = if self.window.is_top(index) {
            (self.day_key.prev(), self.reference_date - Duration::days(1))
        } else {
            (self.day_key, self.reference_date)
        };
        let time = self
            .offsets
            .convert(local.hour, local.minute, ref_date, self.viewer, self.owner);
        OwnerSlot {
            day: ref_day.shift(time.day_offset),
            date: ref_date + Duration::days(time.day_offset),
            time,
        }
    }
}

/// The viewer-local grid of `schedule` for `day_key`, shown through `window`.
///
/// `reference_date` is the calendar date of `day_key` in the viewer's week;
/// it selects which overrides apply and anchors every zone conversion.
///
/// # Errors
///
/// Returns [`crate::ScheduleError::InvalidTimezone`] if the owner's or the
/// viewer's zone is unknown.
pub fn project_user_day_to_local(
    schedule: &UserSchedule,
    viewer_tz: &str,
    reference_date: NaiveDate,
    day_key: DayKey,
    window: &LocalTimeWindow,
) -> Result<Grid> {
    let owner = parse_timezone(&schedule.timezone)?;
    let viewer = parse_timezone(viewer_tz)?;

    tracing::debug!(
        owner = owner.name(),
        viewer = viewer.name(),
        %day_key,
        %reference_date,
        wraps = window.wraps,
        total_slots = window.total_slots,
        "projecting user day to viewer grid"
    );

    if owner == viewer {
        return Ok(same_zone_grid(schedule, reference_date, day_key, window));
    }

    let mut mapper = SlotMapper {
        window,
        reference_date,
        day_key,
        viewer,
        owner,
        offsets: OffsetCache::new(),
    };
    let mut resolved: HashMap<(DayKey, NaiveDate), Vec<TimeSelection>> = HashMap::new();
    let mut grid = vec![false; window.total_slots];

    for (index, cell) in grid.iter_mut().enumerate() {
        let slot = mapper.owner_slot(index);
        let selections = resolved.entry((slot.day, slot.date)).or_insert_with(|| {
            resolve_day_selections(
                &schedule.weekly_availability,
                &schedule.overrides,
                slot.day,
                slot.date,
            )
        });
        let minute = slot.minute_of_day();
        *cell = selections.iter().any(|sel| sel.contains_slot_at(minute));
    }

    Ok(grid)
}

/// Owner-zone selections to persist for an edited viewer-local `grid`.
///
/// Only slots inside the window are written; each affected owner weekday is
/// returned with the selections covering its edited slots, ordered Monday
/// first. Days whose edited slots are all false are omitted, except in the
/// same-zone, non-wrapping case, which always yields exactly one entry.
///
/// # Errors
///
/// Returns [`crate::ScheduleError::InvalidTimezone`] if either zone is
/// unknown.
pub fn project_local_grid_to_user(
    grid: &[bool],
    window: &LocalTimeWindow,
    reference_date: NaiveDate,
    day_key: DayKey,
    viewer_tz: &str,
    owner_tz: &str,
) -> Result<Vec<DaySelections>> {
    let viewer = parse_timezone(viewer_tz)?;
    let owner = parse_timezone(owner_tz)?;

    tracing::debug!(
        owner = owner.name(),
        viewer = viewer.name(),
        %day_key,
        %reference_date,
        "projecting viewer grid back to user days"
    );

    if owner == viewer {
        return Ok(same_zone_selections(grid, window, day_key));
    }

    let mut mapper = SlotMapper {
        window,
        reference_date,
        day_key,
        viewer,
        owner,
        offsets: OffsetCache::new(),
    };
    let mut buckets: BTreeMap<DayKey, Grid> = BTreeMap::new();

    for (index, &value) in grid.iter().enumerate().take(window.total_slots) {
        let slot = mapper.owner_slot(index);
        let bucket = buckets
            .entry(slot.day)
            .or_insert_with(|| vec![false; DAY_SLOTS]);
        if let Some(cell) = bucket.get_mut(slot.slot_index()) {
            *cell = value;
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(day_key, slots)| DaySelections {
            day_key,
            selections: to_selections(&slots, 0),
        })
        .filter(|d| !d.selections.is_empty())
        .collect())
}

// ── Same-zone fast paths ────────────────────────────────────────────────────

/// Direct slice/concat of the owner's resolved day grids.
///
/// A wrapping window reads the previous day's `[0, top)` followed by the
/// current day's `[start, 48)`, matching slot order in the window rather than
/// bottom-then-top.
fn same_zone_grid(
    schedule: &UserSchedule,
    reference_date: NaiveDate,
    day_key: DayKey,
    window: &LocalTimeWindow,
) -> Grid {
    let full_day = |day, date| {
        resolve_day(
            &schedule.weekly_availability,
            &schedule.overrides,
            day,
            date,
            0,
            24,
        )
    };
    let start = window.start_slot().min(DAY_SLOTS);

    if !window.wraps {
        let end = (start + window.total_slots).min(DAY_SLOTS);
        return full_day(day_key, reference_date)[start..end].to_vec();
    }

    let previous = full_day(day_key.prev(), reference_date - Duration::days(1));
    let current = full_day(day_key, reference_date);
    let top = window.top_slots.min(DAY_SLOTS);

    previous[..top]
        .iter()
        .chain(current[start..].iter())
        .copied()
        .collect()
}

fn same_zone_selections(
    grid: &[bool],
    window: &LocalTimeWindow,
    day_key: DayKey,
) -> Vec<DaySelections> {
    if !window.wraps {
        return vec![DaySelections {
            day_key,
            selections: to_selections(&place_in_day(grid, window.start_slot()), 0),
        }];
    }

    let split = window.top_slots.min(grid.len());
    let (top, bottom) = grid.split_at(split);
    let current = place_in_day(bottom, window.start_slot());

    [
        DaySelections {
            day_key: day_key.prev(),
            selections: to_selections(top, 0),
        },
        DaySelections {
            day_key,
            selections: to_selections(&current, 0),
        },
    ]
    .into_iter()
    .filter(|d| !d.selections.is_empty())
    .collect()
}

/// Full-day grid with `slots` written from `start_slot` on, so a half-hour
/// window start survives the codec.
fn place_in_day(slots: &[bool], start_slot: usize) -> Grid {
    let mut day = vec![false; DAY_SLOTS];
    for (cell, &value) in day.iter_mut().skip(start_slot).zip(slots) {
        *cell = value;
    }
    day
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Override, WeeklyAvailability};
    use crate::window::project_window;

    fn sel(sh: u8, sm: u8, eh: u8, em: u8) -> TimeSelection {
        TimeSelection {
            start: TimeOfDay { hour: sh, minute: sm },
            end: TimeOfDay { hour: eh, minute: em },
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2025-01-15 is a Wednesday
    fn wednesday() -> NaiveDate {
        date(2025, 1, 15)
    }

    fn slots_set(grid: &[bool]) -> Vec<usize> {
        grid.iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_same_zone_projection_slices_stored_grid() {
        let week = WeeklyAvailability::new().with_day(DayKey::Wednesday, vec![sel(14, 0, 16, 0)]);
        let schedule = UserSchedule::new("Europe/Madrid", week);
        let w = project_window(10, 18, "Europe/Madrid", "Europe/Madrid", wednesday()).unwrap();

        let grid =
            project_user_day_to_local(&schedule, "Europe/Madrid", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        assert_eq!(grid.len(), 16);
        assert_eq!(slots_set(&grid), vec![8, 9, 10, 11]);
    }

    #[test]
    fn test_same_zone_projection_applies_overrides() {
        let week = WeeklyAvailability::new().with_day(DayKey::Wednesday, vec![sel(14, 0, 16, 0)]);
        let schedule = UserSchedule::new("Europe/Madrid", week).with_overrides(vec![
            Override::block(wednesday(), vec![sel(14, 0, 15, 0)]),
            Override::unblock(wednesday(), vec![sel(10, 0, 10, 30)]),
            Override::block(date(2025, 1, 22), vec![sel(10, 0, 18, 0)]),
        ]);
        let w = LocalTimeWindow::identity(10, 18);

        let grid =
            project_user_day_to_local(&schedule, "Europe/Madrid", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        assert_eq!(slots_set(&grid), vec![0, 10, 11]);
    }

    #[test]
    fn test_cross_zone_projection_shifts_slots() {
        // New York 09:00-11:00 is Madrid 15:00-17:00 in January
        let week = WeeklyAvailability::new().with_day(DayKey::Wednesday, vec![sel(9, 0, 11, 0)]);
        let schedule = UserSchedule::new("America/New_York", week);
        let w = project_window(10, 18, "Europe/Madrid", "Europe/Madrid", wednesday()).unwrap();

        let grid =
            project_user_day_to_local(&schedule, "Europe/Madrid", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        assert_eq!(slots_set(&grid), vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_cross_zone_projection_reads_previous_owner_day() {
        // Madrid 10:00 Wednesday is Los Angeles 01:00 Wednesday; Madrid
        // 08:00 Wednesday is Los Angeles 23:00 Tuesday.
        let week = WeeklyAvailability::new()
            .with_day(DayKey::Tuesday, vec![sel(23, 0, 24, 0)])
            .with_day(DayKey::Wednesday, vec![sel(0, 0, 1, 0)]);
        let schedule = UserSchedule::new("America/Los_Angeles", week);
        let w = LocalTimeWindow::identity(8, 11);

        let grid =
            project_user_day_to_local(&schedule, "Europe/Madrid", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        // 08:00-10:00 Madrid = 23:00 Tue-01:00 Wed LA
        assert_eq!(slots_set(&grid), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cross_zone_projection_uses_override_of_owner_date() {
        let week = WeeklyAvailability::new().with_day(DayKey::Wednesday, vec![sel(9, 0, 11, 0)]);
        let schedule = UserSchedule::new("America/New_York", week)
            .with_overrides(vec![Override::block(wednesday(), vec![sel(9, 0, 10, 0)])]);
        let w = LocalTimeWindow::identity(10, 18);

        let grid =
            project_user_day_to_local(&schedule, "Europe/Madrid", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        assert_eq!(slots_set(&grid), vec![12, 13]);
    }

    #[test]
    fn test_half_hour_offset_requires_full_containment() {
        // Kolkata is UTC+05:30; owner in UTC available 10:00-11:00.
        let week = WeeklyAvailability::new().with_day(DayKey::Wednesday, vec![sel(10, 0, 11, 0)]);
        let schedule = UserSchedule::new("UTC", week);
        let w = LocalTimeWindow::identity(15, 17);

        let grid =
            project_user_day_to_local(&schedule, "Asia/Kolkata", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        // Kolkata 15:30 and 16:00 are UTC 10:00 and 10:30
        assert_eq!(slots_set(&grid), vec![1, 2]);
    }

    #[test]
    fn test_wrapping_window_top_segment_reads_day_before() {
        // Tokyo viewer of a Madrid 10-18 room: top slots are 00:00-02:00
        // Tokyo on the previous day, i.e. Monday 16:00-18:00 Madrid when
        // shown for Wednesday.
        let week = WeeklyAvailability::new()
            .with_day(DayKey::Monday, vec![sel(16, 0, 17, 0)])
            .with_day(DayKey::Wednesday, vec![sel(10, 0, 11, 0)]);
        let schedule = UserSchedule::new("Europe/Madrid", week);
        let w = project_window(10, 18, "Europe/Madrid", "Asia/Tokyo", wednesday()).unwrap();
        assert!(w.wraps);

        let grid =
            project_user_day_to_local(&schedule, "Asia/Tokyo", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        // Top: slots 0,1 (Mon 16:00-17:00 Madrid). Bottom starts at 18:00
        // Tokyo = 10:00 Madrid, so slots 4,5.
        assert_eq!(slots_set(&grid), vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_same_zone_wrapping_window_concatenates_previous_then_current() {
        let week = WeeklyAvailability::new()
            .with_day(DayKey::Tuesday, vec![sel(0, 0, 1, 0)])
            .with_day(DayKey::Wednesday, vec![sel(23, 0, 24, 0)]);
        let schedule = UserSchedule::new("UTC", week);
        let w = LocalTimeWindow {
            start_hour: 22,
            start_minute: 0,
            end_hour: 2,
            end_minute: 0,
            wraps: true,
            top_slots: 4,
            bottom_slots: 4,
            total_slots: 8,
        };

        let grid = project_user_day_to_local(&schedule, "UTC", wednesday(), DayKey::Wednesday, &w)
            .unwrap();
        assert_eq!(grid, vec![true, true, false, false, false, false, true, true]);
    }

    #[test]
    fn test_inverse_same_zone_non_wrapping_is_direct_codec() {
        let w = LocalTimeWindow::identity(10, 12);
        let result = project_local_grid_to_user(
            &[false, true, true, false],
            &w,
            wednesday(),
            DayKey::Wednesday,
            "UTC",
            "UTC",
        )
        .unwrap();
        assert_eq!(
            result,
            vec![DaySelections {
                day_key: DayKey::Wednesday,
                selections: vec![sel(10, 30, 11, 30)],
            }]
        );

        let cleared = project_local_grid_to_user(
            &[false; 4],
            &w,
            wednesday(),
            DayKey::Wednesday,
            "UTC",
            "UTC",
        )
        .unwrap();
        assert_eq!(cleared.len(), 1);
        assert!(cleared[0].selections.is_empty());
    }

    #[test]
    fn test_inverse_same_zone_keeps_half_hour_window_start() {
        // UTC room seen from Kolkata: 15:30-23:30, owner also in Kolkata
        let w = project_window(10, 18, "UTC", "Asia/Kolkata", wednesday()).unwrap();
        assert!(!w.wraps);
        assert_eq!((w.start_hour, w.start_minute), (15, 30));

        let mut grid = vec![false; w.total_slots];
        grid[0] = true;
        let result = project_local_grid_to_user(
            &grid,
            &w,
            wednesday(),
            DayKey::Wednesday,
            "Asia/Kolkata",
            "Asia/Kolkata",
        )
        .unwrap();
        assert_eq!(
            result,
            vec![DaySelections {
                day_key: DayKey::Wednesday,
                selections: vec![sel(15, 30, 16, 0)],
            }]
        );

        let week =
            WeeklyAvailability::new().with_day(DayKey::Wednesday, result[0].selections.clone());
        let schedule = UserSchedule::new("Asia/Kolkata", week);
        let back =
            project_user_day_to_local(&schedule, "Asia/Kolkata", wednesday(), DayKey::Wednesday, &w)
                .unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_inverse_same_zone_wrapping_splits_at_top_slots() {
        let w = LocalTimeWindow {
            start_hour: 22,
            start_minute: 30,
            end_hour: 1,
            end_minute: 0,
            wraps: true,
            top_slots: 2,
            bottom_slots: 3,
            total_slots: 5,
        };
        let result = project_local_grid_to_user(
            &[true, false, false, true, true],
            &w,
            wednesday(),
            DayKey::Monday,
            "UTC",
            "UTC",
        )
        .unwrap();
        assert_eq!(
            result,
            vec![
                DaySelections {
                    day_key: DayKey::Sunday,
                    selections: vec![sel(0, 0, 0, 30)],
                },
                DaySelections {
                    day_key: DayKey::Monday,
                    selections: vec![sel(23, 0, 24, 0)],
                },
            ]
        );
    }

    #[test]
    fn test_inverse_cross_zone_buckets_by_owner_day() {
        // Tokyo viewer editing a Madrid room: top slots go to Monday, bottom
        // slots to Wednesday (Madrid).
        let w = project_window(10, 18, "Europe/Madrid", "Asia/Tokyo", wednesday()).unwrap();
        let mut grid = vec![false; w.total_slots];
        grid[0] = true;
        grid[1] = true;
        grid[4] = true;

        let result = project_local_grid_to_user(
            &grid,
            &w,
            wednesday(),
            DayKey::Wednesday,
            "Asia/Tokyo",
            "Europe/Madrid",
        )
        .unwrap();
        assert_eq!(
            result,
            vec![
                DaySelections {
                    day_key: DayKey::Monday,
                    selections: vec![sel(16, 0, 17, 0)],
                },
                DaySelections {
                    day_key: DayKey::Wednesday,
                    selections: vec![sel(10, 0, 10, 30)],
                },
            ]
        );
    }

    #[test]
    fn test_inverse_cross_zone_omits_empty_days() {
        let w = LocalTimeWindow::identity(10, 18);
        let result = project_local_grid_to_user(
            &vec![false; 16],
            &w,
            wednesday(),
            DayKey::Wednesday,
            "Europe/Madrid",
            "America/New_York",
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unknown_owner_zone_is_an_error() {
        let schedule = UserSchedule::new("Atlantis/Central", WeeklyAvailability::new());
        let w = LocalTimeWindow::identity(10, 18);
        let err = project_user_day_to_local(&schedule, "UTC", wednesday(), DayKey::Wednesday, &w)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Invalid timezone"), "got: {err}");
    }
}
