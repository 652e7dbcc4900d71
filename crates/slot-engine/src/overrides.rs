//! Date-keyed block/unblock exceptions over the recurring week.
//!
//! Overrides for the same date are applied in the order given. When two of
//! them touch the same slot the later one wins; there is no precedence by
//! kind.

use chrono::NaiveDate;

use crate::day::DayKey;
use crate::grid::{to_grid, to_selections, Grid};
use crate::model::{Override, OverrideKind, TimeSelection, WeeklyAvailability};

/// Apply every override dated `date` onto a copy of `base_grid`.
///
/// `base_grid` must cover `[start_hour, end_hour)`; each override is rendered
/// over the same window before being applied.
pub fn apply_overrides(
    base_grid: &[bool],
    overrides: &[Override],
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8,
) -> Grid {
    let mut effective = base_grid.to_vec();

    for o in overrides.iter().filter(|o| o.date == date) {
        let slots = to_grid(&o.availability, start_hour, end_hour);
        let forced = o.kind == OverrideKind::Unblock;
        for (cell, _) in effective
            .iter_mut()
            .zip(slots.iter())
            .filter(|(_, touched)| **touched)
        {
            *cell = forced;
        }
    }

    effective
}

/// The effective grid over `[start_hour, end_hour)`: the recurring selections
/// of `day` with the overrides dated `date` applied.
///
/// Normally `day == DayKey::from_date(date)`; the projectors pass them
/// separately because they walk day keys and dates in lockstep.
pub fn resolve_day(
    weekly: &WeeklyAvailability,
    overrides: &[Override],
    day: DayKey,
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8,
) -> Grid {
    let base = to_grid(weekly.get(day), start_hour, end_hour);
    apply_overrides(&base, overrides, date, start_hour, end_hour)
}

/// Full-day effective availability of `day` on `date`, re-encoded as
/// selections.
pub fn resolve_day_selections(
    weekly: &WeeklyAvailability,
    overrides: &[Override],
    day: DayKey,
    date: NaiveDate,
) -> Vec<TimeSelection> {
    to_selections(&resolve_day(weekly, overrides, day, date, 0, 24), 0)
}
